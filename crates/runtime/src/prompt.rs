//! Sending a prompt stack through a driver while publishing events.

use crate::{Event, EventBus};
use anyhow::Result;
use futures_util::StreamExt;
use model::Driver;
use tcore::{DeltaContent, Message, MessageBuilder, PromptStack, Role};

/// Run a stack through the driver, streaming when the driver does.
///
/// Each attempt publishes `StartPrompt`, then the streamed chunks, then
/// `FinishPrompt`. Failed attempts are retried per the driver's policy
/// unless a chunk was already published.
pub async fn run(driver: &Driver, events: &EventBus, stack: &PromptStack) -> Result<Message> {
    let retry = *driver.retry();
    let token_count = driver.tokenizer().count_tokens(&stack.text());
    let mut attempt = 1;

    loop {
        events
            .publish(Event::StartPrompt {
                model: driver.model().to_owned(),
                token_count,
            })
            .await;

        let mut published = false;
        let result = if driver.stream() {
            stream(driver, events, stack, &mut published).await
        } else {
            driver.try_run(stack).await
        };

        match result {
            Ok(message) => {
                events
                    .publish(Event::FinishPrompt {
                        model: driver.model().to_owned(),
                        usage: message.usage,
                        result: message.text(),
                    })
                    .await;
                return Ok(message);
            }
            Err(e) if !published && attempt < retry.max_attempts => {
                let delay = retry.delay_for(attempt);
                tracing::warn!(
                    "prompt attempt {attempt} on {} failed: {e}, retrying in {delay:?}",
                    driver.model()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn stream(
    driver: &Driver,
    events: &EventBus,
    stack: &PromptStack,
    published: &mut bool,
) -> Result<Message> {
    let mut builder = MessageBuilder::new(Role::Assistant);
    let mut deltas = driver.try_stream(stack.clone());

    while let Some(delta) = deltas.next().await {
        let delta = delta?;
        match &delta.content {
            Some(DeltaContent::Text { text, .. }) => {
                *published = true;
                events
                    .publish(Event::CompletionChunk {
                        token: text.clone(),
                    })
                    .await;
            }
            Some(DeltaContent::Action {
                index,
                tag,
                name,
                path,
                partial_input,
            }) => {
                *published = true;
                events
                    .publish(Event::ActionChunk {
                        index: *index,
                        tag: tag.clone(),
                        name: name.clone(),
                        path: path.clone(),
                        partial_input: partial_input.clone(),
                    })
                    .await;
            }
            None => {}
        }
        builder.accept(&delta);
    }

    Ok(builder.build())
}

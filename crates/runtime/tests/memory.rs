//! Tests for conversation memory and rulesets.

use tcore::{PromptStack, Tokenizer};
use trellis_runtime::{ConversationMemory, Rule, Ruleset, Run, rules};

fn memory_with(runs: usize) -> ConversationMemory {
    let mut memory = ConversationMemory::new();
    for i in 0..runs {
        memory.add_run(Run::new(format!("question {i}"), format!("answer {i}")));
    }
    memory
}

#[test]
fn max_runs_evicts_the_oldest() {
    let mut memory = ConversationMemory::new().with_max_runs(2);
    for i in 0..3 {
        memory.add_run(Run::new(format!("q{i}"), format!("a{i}")));
    }
    let inputs: Vec<_> = memory.runs().iter().map(|r| r.input.as_str()).collect();
    assert_eq!(inputs, ["q1", "q2"]);

    memory.clear();
    assert!(memory.runs().is_empty());
}

#[test]
fn run_ids_are_unique() {
    let a = Run::new("q", "a");
    let b = Run::new("q", "a");
    assert_ne!(a.id, b.id);
    assert_eq!(a.id.len(), 26);
}

#[test]
fn runs_are_inserted_as_message_pairs() {
    let memory = memory_with(2);
    let mut stack = PromptStack::new();
    stack.add_system("rules").add_user("now");

    memory.add_to_stack(&mut stack, &Tokenizer::new(8_192, 1_024), 1);
    let texts: Vec<_> = stack.messages.iter().map(|m| m.text()).collect();
    assert_eq!(
        texts,
        ["rules", "question 0", "answer 0", "question 1", "answer 1", "now"]
    );
    assert!(stack.messages[2].is_assistant());
}

#[test]
fn autoprune_drops_the_oldest_runs() {
    let memory = memory_with(5);
    let mut stack = PromptStack::new();
    stack.add_user("now");

    // each run is ~ 10 tokens, leave room for about two
    let tokenizer = Tokenizer::new(25, 10);
    memory.add_to_stack(&mut stack, &tokenizer, 0);

    let texts: Vec<_> = stack.messages.iter().map(|m| m.text()).collect();
    assert!(texts.len() < 11);
    assert_eq!(texts.last().map(String::as_str), Some("now"));
    assert_eq!(texts[texts.len() - 2], "answer 4");
    assert!(tokenizer.count_input_tokens_left(&stack.text()) > 0);
}

#[test]
fn autoprune_off_keeps_everything() {
    let memory = memory_with(5).with_autoprune(false);
    let mut stack = PromptStack::new();
    stack.add_user("now");
    memory.add_to_stack(&mut stack, &Tokenizer::new(25, 10), 0);
    assert_eq!(stack.messages.len(), 11);
}

#[test]
fn rulesets_render_as_numbered_lists() {
    let text = rules::render(&[Ruleset::new("tone", [Rule::new("be brief")])]);
    assert_eq!(text, "Ruleset name: tone\n\"tone\" rules:\nRule #1\nbe brief");
    assert_eq!(rules::render(&[Ruleset::new("empty", [])]), "");
}

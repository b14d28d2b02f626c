//! Stream example: an agent answering one question token by token.
//!
//! Requires OPENAI_API_KEY (or TRELLIS_CONFIG pointing at a config with a
//! streaming driver). Run with:
//! ```sh
//! cargo run -p trellis-runtime --example stream -- "Why is the sky blue?"
//! ```

mod common;

use futures_util::StreamExt;
use std::io::Write;
use trellis_runtime::{Stream, Structure, StructureKind};

#[tokio::main]
async fn main() {
    common::init_tracing();
    let config = common::load_config();
    let question = std::env::args().nth(1).unwrap_or_else(|| "Say hello.".into());

    let agent = Structure::from_config(StructureKind::Agent, &config, model::Client::new())
        .expect("failed to build agent");
    let mut stream =
        Stream::with_capacity(agent, config.stream.capacity).expect("driver must stream");

    let chunks = stream.run([question]);
    futures_util::pin_mut!(chunks);
    while let Some(chunk) = chunks.next().await {
        match chunk {
            Ok(chunk) => {
                print!("{chunk}");
                let _ = std::io::stdout().flush();
            }
            Err(e) => {
                eprintln!("\nerror: {e}");
                break;
            }
        }
    }
}

//! Chat-Over-TLS client entry point.
//!
//! Wires together configuration, console, and the connection state machine,
//! then hands the terminal to the chat session:
//!
//! ```text
//! main()
//!  └─ ClientConfig::load()   -- config file + one-shot env override
//!  └─ interactive prompts    -- host/port (defaulted), password
//!  └─ ChatClient::run()      -- connect / authenticate / chat / retry
//! ```
//!
//! `run` returns only after a voluntary disconnect (console EOF or a failed
//! send), and the process exits at that point — reconnect-after-failure
//! happens inside the state machine, reconnect-after-goodbye does not happen
//! at all.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_client::infrastructure::config::ClientConfig;
use chat_client::infrastructure::console::{LineInput, LineOutput, StdConsole};
use chat_client::infrastructure::network::connection::ChatClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = ClientConfig::load();

    // Initialise structured logging.  Level is overridden by `RUST_LOG`,
    // falling back to the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!("Chat-Over-TLS client starting");

    let console = Arc::new(StdConsole::new());

    // Empty answers keep the configured defaults.
    let host_answer = console
        .prompt(&format!("Server host [{}]: ", config.connection.host))
        .await;
    let Some(host_answer) = host_answer else {
        return Ok(()); // EOF before we ever connected
    };
    if !host_answer.trim().is_empty() {
        config.connection.host = host_answer.trim().to_string();
    }

    let Some(port_answer) = console
        .prompt(&format!("Server port [{}]: ", config.connection.port))
        .await
    else {
        return Ok(());
    };
    if !port_answer.trim().is_empty() {
        match port_answer.trim().parse::<u16>() {
            Ok(port) => config.connection.port = port,
            Err(_) => {
                console.write_line(&format!(
                    "invalid port {:?}, using {}",
                    port_answer.trim(),
                    config.connection.port
                ));
            }
        }
    }

    let Some(password) = console.prompt("Password: ").await else {
        return Ok(());
    };

    let input: Arc<dyn LineInput> = console.clone();
    let output: Arc<dyn LineOutput> = console.clone();
    let client = ChatClient::new(&config, password, input, output);
    client.run().await;

    info!("session ended; exiting");
    Ok(())
}

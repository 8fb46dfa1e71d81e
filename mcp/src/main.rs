use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use uuid::Uuid;

use repkit_core::program::RandomProgramIds;
use repkit_core::providers::{Providers, resolve_identity};
use repkit_mcp_runtime::{Session, ToolHandlerSet, serve_stdio, to_pretty_json};

#[derive(Parser)]
#[command(
    name = "repkit-mcp",
    version,
    about = "Repkit MCP server — dedicated MCP runtime over stdio"
)]
struct Cli {
    /// Bearer-style user token; unknown or absent tokens resolve to the
    /// default demo identity
    #[arg(long, env = "REPKIT_USER_TOKEN")]
    user_token: Option<String>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let providers = Providers::demo();
    let identity = resolve_identity(cli.user_token.as_deref(), providers.profiles.as_ref());

    // One stdio process is one session for its whole lifetime.
    let session = Arc::new(Session::new(format!("stdio-{}", Uuid::now_v7()), &identity));
    let handlers = ToolHandlerSet::new(session, providers, Arc::new(RandomProgramIds));

    let code = match serve_stdio(&handlers).await {
        Ok(()) => 0,
        Err(err) => {
            let payload = json!({
                "error": "mcp_server_error",
                "message": err,
            });
            eprintln!("{}", to_pretty_json(&payload));
            1
        }
    };
    std::process::exit(code);
}

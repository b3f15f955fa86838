use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    lora_captioner_lib::run().await
}

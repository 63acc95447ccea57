use clap::Parser;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    subtrailer_lib::run(subtrailer_lib::cli::Args::parse()).await
}

#[tokio::main]
async fn main() {
    if let Err(e) = solrdump_rs::run().await {
        eprintln!("{} {:#}", console::style("error:").red().bold(), e);
        std::process::exit(1);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = mortgage_advisor_lib::run().await {
        eprintln!("mortgage-advisor: {e}");
        std::process::exit(1);
    }
}

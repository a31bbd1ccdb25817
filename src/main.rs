use dispatchbro::{action, report, ActionInputs};
use env_logger::Env;
use log::error;
use std::process;
use structopt::StructOpt;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let inputs = ActionInputs::from_args();
    let exit_code = match action::run(&inputs).await {
        Ok(outcome) => {
            if let Some(message) = outcome.failure_message() {
                report::set_failed(&message);
            }
            outcome.exit_code()
        }
        Err(e) => {
            error!("Error running action: {}", e);
            report::set_failed(&format!("Action failed with error: {}", e));
            1
        }
    };
    process::exit(exit_code);
}

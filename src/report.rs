//! Workflow commands understood by the GitHub Actions runner.

/// Marks the step as failed by emitting an `error` workflow command.
pub fn set_failed(message: &str) {
    println!("{}", error_command(message));
}

pub fn error_command(message: &str) -> String {
    format!("::error::{}", escape_data(message))
}

fn escape_data(data: &str) -> String {
    data.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

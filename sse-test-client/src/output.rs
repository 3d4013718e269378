use colored::*;
use std::time::Duration;

#[derive(Debug)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub message: Option<String>,
    pub duration: Duration,
}

impl TestResult {
    pub fn pass(name: &str, duration: Duration) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: None,
            duration,
        }
    }

    pub fn fail(name: &str, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: Some(message.into()),
            duration,
        }
    }
}

pub fn print_test_summary(results: &[TestResult]) {
    for result in results {
        let status = if result.passed {
            "PASS".green().bold()
        } else {
            "FAIL".red().bold()
        };
        println!(
            "{} {} ({}ms)",
            status,
            result.name,
            result.duration.as_millis()
        );
        if let Some(message) = &result.message {
            println!("     {}", message.dimmed());
        }
    }

    let passed = results.iter().filter(|r| r.passed).count();
    println!(
        "\n{} of {} scenarios passed",
        passed.to_string().bold(),
        results.len()
    );
}

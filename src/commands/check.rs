//! Check command implementation.
//!
//! Evaluates every configured limit once and prints the result. No
//! notification is sent and no badness is accumulated.

use herakles_limit_notifier::{format_value, LimitSpec};
use std::fmt::Write as FmtWrite;

use crate::builtin_limits::make_observable_limits;
use crate::config::{validate_effective_config, Config};

/// Outcome of one limit evaluation.
#[derive(Debug)]
pub struct CheckRow {
    pub key: String,
    pub display_name: String,
    pub value: Result<f64, String>,
    pub rule: String,
    pub ok: Option<bool>,
}

/// Evaluates each limit once.
pub fn evaluate_limits(limits: &[LimitSpec]) -> Vec<CheckRow> {
    limits
        .iter()
        .map(|limit| {
            let value = limit.retrieve().map_err(|e| e.to_string());
            let ok = value.as_ref().ok().map(|v| limit.is_ok(*v));
            CheckRow {
                key: limit.key.clone(),
                display_name: limit.display_name.clone(),
                value,
                rule: format!("{} {}", limit.comparison, format_value(limit.threshold)),
                ok,
            }
        })
        .collect()
}

/// Renders check rows as a plain-text table.
pub fn render_check_table(rows: &[CheckRow]) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "{:18} | {:32} | {:>10} | {:>10} | {:6}",
        "Key", "Name", "Value", "Healthy", "Status"
    )
    .ok();
    writeln!(out, "{}", "-".repeat(88)).ok();

    for row in rows {
        let value = match &row.value {
            Ok(v) => format_value(*v),
            Err(_) => "N/A".to_string(),
        };
        let status = match row.ok {
            Some(true) => "OK",
            Some(false) => "FAILED",
            None => "ERROR",
        };
        writeln!(
            out,
            "{:18} | {:32} | {:>10} | {:>10} | {:6}",
            row.key, row.display_name, value, row.rule, status
        )
        .ok();
        if let Err(e) = &row.value {
            writeln!(out, "{:18}   -> {}", "", e).ok();
        }
    }
    out
}

/// Validates the configuration, then evaluates and prints every limit.
///
/// Exits with code 1 on an invalid configuration, and with code 2 in
/// `strict` mode if any limit fails or cannot be read.
pub fn command_check(strict: bool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Herakles Limit Notifier - Limit Check");
    println!("========================================");

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }

    let limits = make_observable_limits(&config.limits);
    println!("\n📊 Evaluating {} limits...\n", limits.len());

    let rows = evaluate_limits(&limits);
    print!("{}", render_check_table(&rows));

    let failed = rows.iter().filter(|r| r.ok != Some(true)).count();
    println!("\n📋 Summary:");
    if failed == 0 {
        println!("   ✅ All limits are within their thresholds");
        Ok(())
    } else {
        println!("   ⚠️  {} of {} limits failed or could not be read", failed, rows.len());
        if strict {
            std::process::exit(2);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herakles_limit_notifier::{Comparison, RetrievalError};

    #[test]
    fn test_evaluate_and_render() {
        let limits = vec![
            LimitSpec::new("ok", "Fine", || Ok(10.0), Comparison::LessThan, 95.0, ""),
            LimitSpec::new("bad", "Full", || Ok(12.0), Comparison::GreaterThan, 30.0, ""),
            LimitSpec::new(
                "err",
                "Broken",
                || Err(RetrievalError::Read("boom".into())),
                Comparison::LessThan,
                1.0,
                "",
            ),
        ];

        let rows = evaluate_limits(&limits);
        assert_eq!(rows[0].ok, Some(true));
        assert_eq!(rows[1].ok, Some(false));
        assert_eq!(rows[1].rule, "> 30.0");
        assert_eq!(rows[2].ok, None);

        let table = render_check_table(&rows);
        assert!(table.contains("FAILED"));
        assert!(table.contains("ERROR"));
        assert!(table.contains("boom"));
    }
}

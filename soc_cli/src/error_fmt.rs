//! Human-readable error descriptions and structured JSON error formatting.

use soc_core::BuildError;

/// Map an `eyre::Report` to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun `soc check-config`."
            ),
            BuildError::MissingChemistry(kind) => format!(
                "What happened: Chemistry '{}' has no table.\nLikely causes: A [[chemistry]] entry was removed or the provider was built without it.\nHow to fix: Add a [[chemistry]] table for it or pick another with --chemistry.",
                kind.name()
            ),
        };
    }

    if let Some(te) = err.downcast_ref::<toml::de::Error>() {
        return format!(
            "What happened: The config file is not valid TOML for this tool.\nLikely causes: A typo in a key or a value of the wrong type.\nHow to fix: Fix the entry reported here: {}",
            te.message()
        );
    }

    // String-based heuristics for errors coming from config loading and validation
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("unknown chemistry") || lower.contains("unknown chemistry code") {
        return format!(
            "What happened: {msg}.\nLikely causes: battery.chemistry or --chemistry names a chemistry that does not exist.\nHow to fix: Use battleborn, chins or spare (or codes 0..2)."
        );
    }

    if lower.contains("ocv csv") || lower.contains("ocv table") || lower.contains("ocv row") {
        return format!(
            "What happened: The OCV table could not be loaded ({msg}).\nLikely causes: Wrong headers, a missing grid point or a duplicate row.\nHow to fix: Provide headers 'soc,temp_c,voc' and one row per soc × temp_c pair."
        );
    }

    if lower.contains("must be") {
        return format!(
            "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML or on the command line.\nHow to fix: Correct the named value and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 for invalid constants, 4 for a missing chemistry, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::InvalidConfig(_)) => 3,
        Some(BuildError::MissingChemistry(_)) => 4,
        None => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = match err.downcast_ref::<BuildError>() {
        Some(BuildError::InvalidConfig(_)) => "InvalidConfig",
        Some(BuildError::MissingChemistry(_)) => "MissingChemistry",
        None => "Error",
    };
    json!({ "reason": reason, "message": humanize(err) }).to_string()
}

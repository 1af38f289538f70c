//! Fuzz target for policy parsing.
//!
//! Rule strings and role lists come straight from on-chain configuration.
//!
//! ## Running
//!
//! ```bash
//! cd crates/qc-10-access-control
//! cargo +nightly fuzz run fuzz_rule_parse
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use qc_10_access_control::{Policy, Rule};
use shared_types::PolicyConfig;

#[derive(Debug, arbitrary::Arbitrary)]
struct PolicyInput {
    rule: String,
    org_list: Vec<String>,
    role_list: Vec<String>,
}

fuzz_target!(|input: PolicyInput| {
    // Parsing must never panic.
    if let Ok(rule) = input.rule.parse::<Rule>() {
        // Accepted rules print back to a string that parses to the same rule.
        assert_eq!(rule.to_string().parse::<Rule>().ok(), Some(rule));
    }

    let config = PolicyConfig {
        rule: input.rule,
        org_list: input.org_list,
        role_list: input.role_list,
    };
    if let Ok(policy) = Policy::from_config(&config) {
        let again = Policy::from_config(&policy.to_config()).expect("normalized policy parses");
        assert_eq!(again, policy);
    }
});

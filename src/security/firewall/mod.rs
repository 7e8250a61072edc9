mod filter;
mod rules;

pub use filter::{evaluate, evaluate_at, EngineConfig, Firewall};
pub use rules::{action_to_verdict, FirewallAction, FirewallRule, RuleMatch, RuleSet, Verdict};

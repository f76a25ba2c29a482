//! Per-field merge policy
//!
//! Each mutable field group of a workload gets its own equality predicate.
//! The predicates are deliberately narrow so tie-breaks stay visible:
//!
//! - command, args, volumes and mounts compare in order
//! - env compares by name, ignoring order; an absent value equals `""`
//! - node selectors compare as maps
//! - tolerations compare as a multiset of whole tuples
//! - resources compare by parsed quantity; unset equals empty
//!
//! [`merge`] turns a predicate result into a [`Merged`] value: the desired
//! side when they differ, the actual side otherwise.

use std::collections::BTreeMap;

use crate::k8s::{EnvVar, ResourceQuantity, ResourceRequirements, Toleration};
use crate::workload::PodSpec;

/// Result of merging one field group
#[derive(Clone, Debug, PartialEq)]
pub struct Merged<T> {
    /// Value to write
    pub value: T,
    /// Whether `value` differs from what is stored
    pub changed: bool,
}

/// Keep `actual` when `equal`, otherwise take `desired`
pub fn merge<T: Clone>(desired: &T, actual: &T, equal: bool) -> Merged<T> {
    if equal {
        Merged {
            value: actual.clone(),
            changed: false,
        }
    } else {
        Merged {
            value: desired.clone(),
            changed: true,
        }
    }
}

// =============================================================================
// Predicates
// =============================================================================

/// Order-sensitive slice equality
pub fn ordered_eq<T: PartialEq>(desired: &[T], actual: &[T]) -> bool {
    desired == actual
}

/// Command or args, where an unset list equals an empty one
pub fn args_eq(desired: Option<&Vec<String>>, actual: Option<&Vec<String>>) -> bool {
    let empty = Vec::new();
    ordered_eq(desired.unwrap_or(&empty), actual.unwrap_or(&empty))
}

fn normalize_env(env: &[EnvVar]) -> Vec<EnvVar> {
    let mut env: Vec<EnvVar> = env
        .iter()
        .map(|var| {
            let mut var = var.clone();
            if var.value.is_none() && var.value_from.is_none() {
                var.value = Some(String::new());
            }
            var
        })
        .collect();
    env.sort();
    env
}

/// Environment equality keyed on variable name
pub fn env_eq(desired: &[EnvVar], actual: &[EnvVar]) -> bool {
    normalize_env(desired) == normalize_env(actual)
}

/// Node selector equality
pub fn node_selector_eq(
    desired: &BTreeMap<String, String>,
    actual: &BTreeMap<String, String>,
) -> bool {
    desired == actual
}

/// Toleration multiset equality
///
/// Every field of a toleration takes part, so the same key and value with a
/// different effect is a different toleration.
pub fn tolerations_eq(desired: &[Toleration], actual: &[Toleration]) -> bool {
    if desired.len() != actual.len() {
        return false;
    }
    let mut desired = desired.to_vec();
    let mut actual = actual.to_vec();
    desired.sort();
    actual.sort();
    desired == actual
}

/// Resource requirement equality
pub fn resources_eq(
    desired: Option<&ResourceRequirements>,
    actual: Option<&ResourceRequirements>,
) -> bool {
    let empty = ResourceRequirements::default();
    let desired = desired.unwrap_or(&empty);
    let actual = actual.unwrap_or(&empty);
    quantities_eq(desired.requests.as_ref(), actual.requests.as_ref())
        && quantities_eq(desired.limits.as_ref(), actual.limits.as_ref())
}

fn quantities_eq(desired: Option<&ResourceQuantity>, actual: Option<&ResourceQuantity>) -> bool {
    let empty = ResourceQuantity::default();
    let desired = desired.unwrap_or(&empty);
    let actual = actual.unwrap_or(&empty);
    quantity_eq(desired.cpu.as_deref(), actual.cpu.as_deref())
        && quantity_eq(desired.memory.as_deref(), actual.memory.as_deref())
}

/// Compare two quantity strings by value (`1000m` == `1`, `1Gi` == `1024Mi`)
///
/// Values are compared exactly. Strings that do not parse, or that overflow,
/// are compared verbatim.
pub fn quantity_eq(desired: Option<&str>, actual: Option<&str>) -> bool {
    match (desired, actual) {
        (None, None) => true,
        (Some(d), Some(a)) => match (Quantity::parse(d), Quantity::parse(a)) {
            (Some(d), Some(a)) => d == a,
            _ => d == a,
        },
        _ => false,
    }
}

const NANO: i128 = 1_000_000_000;

/// Suffix multipliers in nano-units; binary suffixes are matched first
const SUFFIXES: [(&str, i128); 16] = [
    ("Ki", (1 << 10) * NANO),
    ("Mi", (1 << 20) * NANO),
    ("Gi", (1 << 30) * NANO),
    ("Ti", (1 << 40) * NANO),
    ("Pi", (1 << 50) * NANO),
    ("Ei", (1 << 60) * NANO),
    ("n", 1),
    ("u", 1_000),
    ("m", 1_000_000),
    ("k", 1_000 * NANO),
    ("M", 1_000_000 * NANO),
    ("G", 1_000_000_000 * NANO),
    ("T", 1_000_000_000_000 * NANO),
    ("P", 1_000_000_000_000_000 * NANO),
    ("E", 1_000_000_000_000_000_000 * NANO),
    ("", NANO),
];

/// Exact quantity: `units / 10^scale` nano-units, with `scale` kept minimal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Quantity {
    units: i128,
    scale: u32,
}

impl Quantity {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        // `1E` and `1Ei` are suffixes, `1e3` and `1E3` carry an exponent
        let (number, exponent) = raw
            .find(|c: char| c == 'e' || c == 'E')
            .and_then(|at| {
                raw[at + 1..]
                    .parse::<i32>()
                    .ok()
                    .map(|exponent| (&raw[..at], exponent))
            })
            .unwrap_or((raw, 0));
        let (number, factor) = SUFFIXES
            .iter()
            .find_map(|(suffix, factor)| number.strip_suffix(*suffix).map(|n| (n, *factor)))?;
        Self::new(number, factor, exponent)
    }

    fn new(number: &str, factor: i128, exponent: i32) -> Option<Self> {
        let (negative, digits) = match number.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, number.strip_prefix('+').unwrap_or(number)),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }

        let mut units: i128 = 0;
        for c in whole.chars().chain(fraction.chars()) {
            units = units
                .checked_mul(10)?
                .checked_add(i128::from(c.to_digit(10)?))?;
        }
        units = units.checked_mul(factor)?;
        let mut scale = u32::try_from(fraction.len()).ok()?;
        if exponent >= 0 {
            units = units.checked_mul(10i128.checked_pow(exponent.unsigned_abs())?)?;
        } else {
            scale = scale.checked_add(exponent.unsigned_abs())?;
        }

        while scale > 0 && units % 10 == 0 {
            units /= 10;
            scale -= 1;
        }
        if negative {
            units = -units;
        }
        Some(Self { units, scale })
    }
}

// =============================================================================
// Node placement
// =============================================================================

/// Node selector and tolerations, merged as one unit
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodePlacement {
    /// Node selector
    pub node_selector: BTreeMap<String, String>,
    /// Tolerations
    pub tolerations: Vec<Toleration>,
}

impl NodePlacement {
    /// Placement currently set on a pod spec
    pub fn of(pod: &PodSpec) -> Self {
        Self {
            node_selector: pod.node_selector.clone(),
            tolerations: pod.tolerations.clone(),
        }
    }
}

/// Merge node placement; either half differing replaces both
pub fn merge_node_placement(desired: &PodSpec, actual: &PodSpec) -> Merged<NodePlacement> {
    let equal = node_selector_eq(&desired.node_selector, &actual.node_selector)
        && tolerations_eq(&desired.tolerations, &actual.tolerations);
    merge(&NodePlacement::of(desired), &NodePlacement::of(actual), equal)
}

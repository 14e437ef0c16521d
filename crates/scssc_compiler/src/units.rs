//! Unit tables: the known units, their type classes, conversion factors and
//! merge weights.

/// All units the expression scanner recognizes.
pub const UNITS: &[&str] = &[
    "em", "ex", "px", "cm", "mm", "in", "pt", "pc", "deg", "rad", "grad", "ms", "s", "hz", "khz",
    "%",
];

/// Units a zero magnitude may drop in compressed output. Percentages and
/// time/frequency units keep theirs.
pub const ZERO_UNITS: &[&str] = &["em", "ex", "px", "cm", "mm", "in", "pt", "pc"];

/// Merge weight of a unit; the heavier side dominates the merged weight map.
#[must_use]
pub fn unit_weight(unit: &str) -> i32 {
    match unit {
        "em" | "mm" | "ms" | "hz" => 10,
        "%" => 100,
        _ => 1,
    }
}

/// Type class of a unit; units convert only within a class.
#[must_use]
pub fn unit_class(unit: &str) -> Option<&'static str> {
    match unit {
        "em" | "px" => Some("size"),
        "mm" | "cm" | "in" | "pt" | "pc" => Some("length"),
        "ms" | "s" => Some("time"),
        "hz" | "khz" => Some("freq"),
        "%" => Some("any"),
        _ => None,
    }
}

/// Conversion factor of a unit towards its class base unit.
#[must_use]
pub fn conv_factor(unit: &str) -> Option<f64> {
    match unit {
        "em" => Some(13.0),
        "px" => Some(1.0),
        "mm" => Some(1.0),
        "cm" => Some(10.0),
        "in" => Some(25.4),
        "pt" => Some(25.4 / 72.0),
        "pc" => Some(25.4 / 6.0),
        "ms" => Some(1.0),
        "s" => Some(1000.0),
        "hz" => Some(1.0),
        "khz" => Some(1000.0),
        "%" => Some(1.0 / 100.0),
        _ => None,
    }
}

/// True when two units belong to the same (known) type class.
#[must_use]
pub fn comparable(left: &str, right: &str) -> bool {
    match (unit_class(left), unit_class(right)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[must_use]
pub fn is_unit(token: &str) -> bool {
    UNITS.contains(&token)
}

#[cfg(test)]
mod tests {
    use super::{comparable, conv_factor, unit_class, unit_weight};
    use test_case::test_case;

    #[test_case("px", Some("size"))]
    #[test_case("em", Some("size"))]
    #[test_case("cm", Some("length"))]
    #[test_case("s", Some("time"))]
    #[test_case("khz", Some("freq"))]
    #[test_case("%", Some("any"))]
    #[test_case("deg", None)]
    #[test_case("rad", None)]
    fn classes(unit: &str, expected: Option<&'static str>) {
        assert_eq!(unit_class(unit), expected);
    }

    #[test]
    fn comparability() {
        assert!(comparable("px", "em"));
        assert!(comparable("ms", "s"));
        assert!(!comparable("px", "s"));
        assert!(!comparable("px", "%"));
    }

    #[test]
    fn factors() {
        assert_eq!(conv_factor("em"), Some(13.0));
        assert_eq!(conv_factor("s"), Some(1000.0));
        assert_eq!(conv_factor("deg"), None);
    }

    #[test]
    fn weights() {
        assert_eq!(unit_weight("em"), 10);
        assert_eq!(unit_weight("%"), 100);
        assert_eq!(unit_weight("px"), 1);
    }
}

//! Primitive types and the operator unification tables.

use std::fmt;

/// Primitive types of the source language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Real,
    Bool,
    Str,
    /// Signals a type error; never a valid operand type
    NoType,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Real => write!(f, "real"),
            Type::Bool => write!(f, "bool"),
            Type::Str => write!(f, "string"),
            Type::NoType => write!(f, "no_type"),
        }
    }
}

/// Implicit conversion operators inserted by the checker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conv {
    B2I,
    B2R,
    B2S,
    I2R,
    I2S,
    R2S,
    None,
}

/// Result of unifying two operand types under an operator class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unified {
    pub ty: Type,
    pub lconv: Conv,
    pub rconv: Conv,
}

impl Unified {
    const fn new(ty: Type, lconv: Conv, rconv: Conv) -> Self {
        Self { ty, lconv, rconv }
    }

    /// The failed unification: no result type, no conversions.
    pub const NONE: Unified = Unified::new(Type::NoType, Conv::None, Conv::None);
}

use Conv::{B2I, B2R, B2S, I2R, I2S, R2S};
use Type::{Bool, Int, NoType, Real, Str};

const NC: Conv = Conv::None;

// Rows and columns are ordered Int, Real, Bool, Str. The Int+Bool -> Int
// cells and the empty Bool/Bool comparison cell are deliberate.
#[rustfmt::skip]
const PLUS: [[Unified; 4]; 4] = [
    [Unified::new(Int, NC, NC),   Unified::new(Real, I2R, NC), Unified::new(Int, NC, B2I),  Unified::new(Str, I2S, NC)],
    [Unified::new(Real, NC, I2R), Unified::new(Real, NC, NC),  Unified::new(Real, NC, B2R), Unified::new(Str, R2S, NC)],
    [Unified::new(Int, B2I, NC),  Unified::new(Real, B2R, NC), Unified::new(Bool, NC, NC),  Unified::new(Str, B2S, NC)],
    [Unified::new(Str, NC, I2S),  Unified::new(Str, NC, R2S),  Unified::new(Str, NC, B2S),  Unified::new(Str, NC, NC)],
];

#[rustfmt::skip]
const OTHER_ARITH: [[Unified; 4]; 4] = [
    [Unified::new(Int, NC, NC),   Unified::new(Real, I2R, NC), Unified::NONE, Unified::NONE],
    [Unified::new(Real, NC, I2R), Unified::new(Real, NC, NC),  Unified::NONE, Unified::NONE],
    [Unified::NONE,               Unified::NONE,               Unified::NONE, Unified::NONE],
    [Unified::NONE,               Unified::NONE,               Unified::NONE, Unified::NONE],
];

#[rustfmt::skip]
const COMP: [[Unified; 4]; 4] = [
    [Unified::new(Bool, NC, NC),  Unified::new(Bool, I2R, NC), Unified::NONE, Unified::NONE],
    [Unified::new(Bool, NC, I2R), Unified::new(Bool, NC, NC),  Unified::NONE, Unified::NONE],
    [Unified::NONE,               Unified::NONE,               Unified::NONE, Unified::NONE],
    [Unified::NONE,               Unified::NONE,               Unified::NONE, Unified::new(Bool, NC, NC)],
];

impl Type {
    fn table_index(self) -> Option<usize> {
        match self {
            Int => Some(0),
            Real => Some(1),
            Bool => Some(2),
            Str => Some(3),
            NoType => None,
        }
    }

    fn unify(self, that: Type, table: &[[Unified; 4]; 4]) -> Unified {
        match (self.table_index(), that.table_index()) {
            (Some(i), Some(j)) => table[i][j],
            _ => Unified::NONE,
        }
    }

    /// Unification for the `+` operator.
    pub fn unify_plus(self, that: Type) -> Unified {
        self.unify(that, &PLUS)
    }

    /// Unification for `-`, `*` and `/`.
    pub fn unify_other_arith(self, that: Type) -> Unified {
        self.unify(that, &OTHER_ARITH)
    }

    /// Unification for the relational operators.
    pub fn unify_comp(self, that: Type) -> Unified {
        self.unify(that, &COMP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Type; 4] = [Int, Real, Bool, Str];

    fn u(ty: Type, lconv: Conv, rconv: Conv) -> Unified {
        Unified { ty, lconv, rconv }
    }

    #[test]
    fn plus_table_is_exact() {
        #[rustfmt::skip]
        let expected = [
            [u(Int, NC, NC),   u(Real, I2R, NC), u(Int, NC, B2I),  u(Str, I2S, NC)],
            [u(Real, NC, I2R), u(Real, NC, NC),  u(Real, NC, B2R), u(Str, R2S, NC)],
            [u(Int, B2I, NC),  u(Real, B2R, NC), u(Bool, NC, NC),  u(Str, B2S, NC)],
            [u(Str, NC, I2S),  u(Str, NC, R2S),  u(Str, NC, B2S),  u(Str, NC, NC)],
        ];
        for (i, l) in ALL.iter().enumerate() {
            for (j, r) in ALL.iter().enumerate() {
                assert_eq!(l.unify_plus(*r), expected[i][j], "{l} + {r}");
            }
        }
    }

    #[test]
    fn other_arith_table_is_exact() {
        for (i, l) in ALL.iter().enumerate() {
            for (j, r) in ALL.iter().enumerate() {
                let got = l.unify_other_arith(*r);
                let expected = match (i, j) {
                    (0, 0) => u(Int, NC, NC),
                    (0, 1) => u(Real, I2R, NC),
                    (1, 0) => u(Real, NC, I2R),
                    (1, 1) => u(Real, NC, NC),
                    _ => Unified::NONE,
                };
                assert_eq!(got, expected, "{l} op {r}");
            }
        }
    }

    #[test]
    fn comp_table_is_exact() {
        for (i, l) in ALL.iter().enumerate() {
            for (j, r) in ALL.iter().enumerate() {
                let got = l.unify_comp(*r);
                let expected = match (i, j) {
                    (0, 0) => u(Bool, NC, NC),
                    (0, 1) => u(Bool, I2R, NC),
                    (1, 0) => u(Bool, NC, I2R),
                    (1, 1) => u(Bool, NC, NC),
                    (3, 3) => u(Bool, NC, NC),
                    _ => Unified::NONE,
                };
                assert_eq!(got, expected, "{l} cmp {r}");
            }
        }
    }

    #[test]
    fn int_plus_bool_yields_int() {
        // Asymmetric widening quirk: booleans combine with ints as ints.
        assert_eq!(Int.unify_plus(Bool), u(Int, NC, B2I));
        assert_eq!(Bool.unify_plus(Int), u(Int, B2I, NC));
    }

    #[test]
    fn bool_comparison_is_a_type_error() {
        // Unlike Str/Str, the Bool/Bool comparison cell does not unify.
        assert_eq!(Bool.unify_comp(Bool), Unified::NONE);
        assert_eq!(Str.unify_comp(Str), u(Bool, NC, NC));
    }

    #[test]
    fn no_type_never_unifies() {
        for t in ALL {
            assert_eq!(NoType.unify_plus(t), Unified::NONE);
            assert_eq!(t.unify_comp(NoType), Unified::NONE);
        }
    }

    #[test]
    fn type_names() {
        assert_eq!(Int.to_string(), "int");
        assert_eq!(Real.to_string(), "real");
        assert_eq!(Bool.to_string(), "bool");
        assert_eq!(Str.to_string(), "string");
        assert_eq!(NoType.to_string(), "no_type");
    }
}

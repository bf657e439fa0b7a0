/// Fun types, as seen by the checker.
///
/// `Error` is the type of anything that already produced a diagnostic; it
/// is equivalent to every type so one mistake is reported once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Void,
    Bool,
    Int,
    /// Parameter list of a procedure or function.
    Sequence(Vec<Type>),
    /// `domain -> range` for procedures and functions.
    Mapping { domain: Box<Type>, range: Box<Type> },
    Error,
}

impl Type {
    pub fn mapping(domain: Type, range: Type) -> Self {
        Type::Mapping {
            domain: Box::new(domain),
            range: Box::new(range),
        }
    }

    /// Domain type of a parameter list: `void`, the single type, or a
    /// sequence.
    pub fn params(mut types: Vec<Type>) -> Self {
        match types.len() {
            0 => Type::Void,
            1 => types.remove(0),
            _ => Type::Sequence(types),
        }
    }

    /// Structural equivalence, with `Error` matching anything.
    pub fn equiv(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Error, _) | (_, Type::Error) => true,
            (Type::Sequence(a), Type::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equiv(y))
            }
            (
                Type::Mapping {
                    domain: d1,
                    range: r1,
                },
                Type::Mapping {
                    domain: d2,
                    range: r2,
                },
            ) => d1.equiv(d2) && r1.equiv(r2),
            (a, b) => a == b,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Error => write!(f, "error"),
            Type::Sequence(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Type::Mapping { domain, range } => write!(f, "{} -> {}", domain, range),
        }
    }
}

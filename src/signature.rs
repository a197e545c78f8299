//! Signature descriptors for native signals.
//!
//! A descriptor reduces each argument type of a signal's textual signature to
//! an [`ArgKind`]. Template arguments and nested parentheses are tracked so
//! that `QMap<int, QString>` stays one argument.

use std::fmt;

use tracing::warn;

use crate::error::{BridgeResult, owned_name};
use crate::member::base_name;
use crate::services::TypeMapper;

/// Builtin scalar types the marshaller handles directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Double,
}

impl ScalarKind {
    pub fn from_type_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => ScalarKind::Bool,
            "char" | "signed char" | "qint8" => ScalarKind::Int8,
            "short" | "short int" | "qint16" => ScalarKind::Int16,
            "int" | "long" | "qint32" => ScalarKind::Int32,
            "long long" | "qint64" | "qlonglong" => ScalarKind::Int64,
            "unsigned char" | "uchar" | "quint8" => ScalarKind::UInt8,
            "unsigned short" | "ushort" | "quint16" => ScalarKind::UInt16,
            "unsigned" | "unsigned int" | "uint" | "unsigned long" | "ulong" | "quint32" => {
                ScalarKind::UInt32
            }
            "unsigned long long" | "quint64" | "qulonglong" => ScalarKind::UInt64,
            "float" => ScalarKind::Float,
            "double" | "qreal" => ScalarKind::Double,
            _ => return None,
        })
    }
}

/// Marshalling class of one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    Scalar(ScalarKind),
    /// `char *` style strings.
    String,
    Pointer,
    /// Not marshal-able; passed through untouched.
    Opaque,
}

impl ArgKind {
    pub fn is_supported(&self) -> bool {
        !matches!(self, ArgKind::Opaque)
    }
}

/// One parsed argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgType {
    /// The type text as written, trimmed.
    pub raw: String,
    pub kind: ArgKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arguments {
    Parsed(Vec<ArgType>),
    /// The argument list could not be parsed and is passed through whole.
    Opaque(String),
}

/// Parsed form of a signal signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureDescriptor {
    pub name: String,
    pub args: Arguments,
}

impl SignatureDescriptor {
    /// Parse `signature` (without sentinel), classifying unknown types with
    /// `mapper`.
    ///
    /// Malformed argument lists degrade to [`Arguments::Opaque`]. Only
    /// allocation failure is an error.
    pub fn parse(signature: &str, mapper: &dyn TypeMapper) -> BridgeResult<Self> {
        let name = owned_name(base_name(signature))?;
        let Some(open) = signature.find('(') else {
            return Ok(Self {
                name,
                args: Arguments::Parsed(Vec::new()),
            });
        };

        let list = &signature[open + 1..];
        let args = match split_arguments(list)? {
            Some(parts) => {
                let mut args = Vec::new();
                args.try_reserve_exact(parts.len())?;
                let mut anomaly = false;
                for part in parts {
                    let raw = part.trim();
                    if raw.is_empty() {
                        anomaly = true;
                        break;
                    }
                    args.push(ArgType {
                        raw: owned_name(raw)?,
                        kind: classify(raw, mapper),
                    });
                }
                if anomaly {
                    warn!(signature, "empty argument in signal signature");
                    Arguments::Opaque(owned_name(list)?)
                } else {
                    Arguments::Parsed(args)
                }
            }
            None => {
                warn!(signature, "unbalanced signal signature");
                Arguments::Opaque(owned_name(list)?)
            }
        };

        Ok(Self { name, args })
    }

    /// Number of arguments, if the list was parsed.
    pub fn arg_count(&self) -> Option<usize> {
        match &self.args {
            Arguments::Parsed(args) => Some(args.len()),
            Arguments::Opaque(_) => None,
        }
    }

    pub fn arg_kinds(&self) -> impl Iterator<Item = ArgKind> + '_ {
        let parsed = match &self.args {
            Arguments::Parsed(args) => args.as_slice(),
            Arguments::Opaque(_) => &[],
        };
        parsed.iter().map(|arg| arg.kind)
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self.args, Arguments::Opaque(_))
    }
}

impl fmt::Display for SignatureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        match &self.args {
            Arguments::Parsed(args) => {
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", arg.raw)?;
                }
                write!(f, ")")
            }
            Arguments::Opaque(list) => write!(f, "{list}"),
        }
    }
}

/// Split the text after `(` at top-level commas, up to the closing `)`.
///
/// Returns `None` if brackets do not balance.
fn split_arguments(list: &str) -> BridgeResult<Option<Vec<&str>>> {
    let mut parts = Vec::new();
    let mut angle = 0usize;
    let mut paren = 0usize;
    let mut start = 0;

    for (i, c) in list.char_indices() {
        match c {
            '<' => angle += 1,
            '>' => match angle.checked_sub(1) {
                Some(depth) => angle = depth,
                None => return Ok(None),
            },
            '(' => paren += 1,
            ')' if paren > 0 => paren -= 1,
            ')' => {
                if angle != 0 || !list[i + 1..].trim().is_empty() {
                    return Ok(None);
                }
                let last = &list[start..i];
                if !(parts.is_empty() && last.trim().is_empty()) {
                    parts.try_reserve(1)?;
                    parts.push(last);
                }
                return Ok(Some(parts));
            }
            ',' if angle == 0 && paren == 0 => {
                parts.try_reserve(1)?;
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    Ok(None)
}

fn classify(raw: &str, mapper: &dyn TypeMapper) -> ArgKind {
    let base = raw.strip_prefix("const ").unwrap_or(raw).trim();
    let base = base.strip_suffix('&').unwrap_or(base).trim_end();

    if let Some(pointee) = base.strip_suffix('*') {
        return match pointee.trim_end() {
            "char" => ArgKind::String,
            _ => ArgKind::Pointer,
        };
    }

    ScalarKind::from_type_name(base)
        .map(ArgKind::Scalar)
        .unwrap_or_else(|| mapper.classify(base))
}

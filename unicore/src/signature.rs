//! Structural function signatures used to disambiguate overloaded exports.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{UniError, UniResult};

/// ABI-level scalar types describing exported function parameters and
/// returns. `ptr` covers every pointer-typed parameter; pointee types are not
/// part of the dispatch contract.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum CType {
    Void,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Ptr,
}

/// A structural description of a function's parameter and return types.
///
/// Signatures key variant groups within one exported name, so they must be
/// unique per export. Text form is `ret(param, param, ...)`, e.g.
/// `"i64(i64, i64)"` or `"void(ptr)"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Signature {
    params: Vec<CType>,
    ret: CType,
}

impl Signature {
    pub fn new(params: Vec<CType>, ret: CType) -> Self {
        Signature { params, ret }
    }

    pub fn params(&self) -> &[CType] {
        &self.params
    }

    pub fn ret(&self) -> CType {
        self.ret
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.ret)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ")")
    }
}

impl FromStr for Signature {
    type Err = UniError;

    fn from_str(text: &str) -> UniResult<Self> {
        let parse_err = |reason: String| UniError::SignatureParse {
            text: text.to_string(),
            reason,
        };

        let trimmed = text.trim();
        let open = trimmed
            .find('(')
            .ok_or_else(|| parse_err("missing '('".to_string()))?;
        let (ret_text, rest) = trimmed.split_at(open);
        let inner = rest[1..]
            .strip_suffix(')')
            .ok_or_else(|| parse_err("missing terminating ')'".to_string()))?;

        let ret = ret_text
            .trim()
            .parse::<CType>()
            .map_err(|_| parse_err(format!("unknown return type '{}'", ret_text.trim())))?;

        let mut params = Vec::new();
        if !inner.trim().is_empty() {
            for token in inner.split(',') {
                let token = token.trim();
                let param = token
                    .parse::<CType>()
                    .map_err(|_| parse_err(format!("unknown parameter type '{}'", token)))?;
                if param == CType::Void {
                    return Err(parse_err("'void' is not a parameter type".to_string()));
                }
                params.push(param);
            }
        }

        Ok(Signature::new(params, ret))
    }
}

//! Static typed construction of callable bindings from resolved addresses.
//!
//! A fixed, compile-time mapping from `unsafe extern "C" fn` types to
//! [`Signature`] values lets the runtime hand out concrete function pointers
//! without ever synthesizing code: a caller names the function type it
//! expects, and the binding checks that type against the signature the
//! manifest promised before reinterpreting the address.

use std::ffi::c_void;

use unicore::signature::{CType, Signature};

use crate::error::{LoadError, LoadResult};

/// Maps ABI-compatible Rust parameter types to their [`CType`] tags.
pub trait AbiType: Copy {
    const CTYPE: CType;
}

/// Maps ABI-compatible Rust return types to their [`CType`] tags; `()` maps
/// to `void`.
pub trait AbiRet: Copy {
    const CTYPE: CType;
}

macro_rules! abi_scalar {
    ($($ty:ty => $tag:ident),+ $(,)?) => {$(
        impl AbiType for $ty {
            const CTYPE: CType = CType::$tag;
        }
        impl AbiRet for $ty {
            const CTYPE: CType = CType::$tag;
        }
    )+};
}

abi_scalar!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    *mut c_void => Ptr,
    *const c_void => Ptr,
);

impl AbiRet for () {
    const CTYPE: CType = CType::Void;
}

/// Structural signature of a concrete `unsafe extern "C" fn` type.
pub trait FnSignature: Copy {
    fn signature() -> Signature;
}

macro_rules! fn_signature_arity {
    ($($arg:ident),*) => {
        impl<R: AbiRet, $($arg: AbiType),*> FnSignature for unsafe extern "C" fn($($arg),*) -> R {
            fn signature() -> Signature {
                Signature::new(vec![$($arg::CTYPE),*], R::CTYPE)
            }
        }
    };
}

fn_signature_arity!();
fn_signature_arity!(A);
fn_signature_arity!(A, B);
fn_signature_arity!(A, B, C);
fn_signature_arity!(A, B, C, D);
fn_signature_arity!(A, B, C, D, E);
fn_signature_arity!(A, B, C, D, E, F);

/// A resolved, callable binding for one selected variant.
///
/// Holds the signature the manifest promised and the address the host loader
/// resolved. The address stays valid only while the image that produced it is
/// loaded; the load manager guarantees that for bindings reached through its
/// resolved table.
#[derive(Debug, Clone)]
pub struct Binding {
    symbol: String,
    signature: Signature,
    address: usize,
}

impl Binding {
    pub(crate) fn new(symbol: String, signature: Signature, address: usize) -> Self {
        Binding {
            symbol,
            signature,
            address,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn address(&self) -> usize {
        self.address
    }

    /// Reinterpret the resolved address as the concrete function type `F`.
    ///
    /// Succeeds only when `F`'s structural signature equals the variant's
    /// signature; otherwise fails with [`LoadError::SignatureMismatch`].
    /// Calling the returned pointer is unsafe as usual for foreign functions
    /// and additionally requires the originating image to still be loaded.
    pub fn typed<F: FnSignature>(&self) -> LoadResult<F> {
        let requested = F::signature();
        if requested != self.signature {
            return Err(LoadError::SignatureMismatch {
                symbol: self.symbol.clone(),
                expected: self.signature.clone(),
                requested,
            });
        }

        debug_assert_eq!(size_of::<F>(), size_of::<usize>());
        // Signature equality was just checked; fn pointers are address-sized.
        Ok(unsafe { std::mem::transmute_copy::<usize, F>(&self.address) })
    }
}

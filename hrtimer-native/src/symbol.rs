//! Dynamic symbol lookup used to bind native timer entry points
//!
//! Native functions are resolved once, by an explicit `bind()` on each
//! platform primitive, instead of being linked implicitly. The lookup is a
//! trait so hosts with their own loader can supply it.

use {
    crate::error::{Result, TimerError},
    std::{ffi::c_void, mem, ptr::NonNull},
    tracing::debug,
};

/// Resolves exported symbols of shared libraries
pub trait SymbolLookup {
    /// Address of `symbol` exported by `library`
    fn resolve(&self, library: &str, symbol: &str) -> Result<NonNull<c_void>>;
}

impl<L: SymbolLookup + ?Sized> SymbolLookup for &L {
    fn resolve(&self, library: &str, symbol: &str) -> Result<NonNull<c_void>> {
        (**self).resolve(library, symbol)
    }
}

/// Resolve `symbol` and reinterpret it as the function pointer type `F`.
///
/// `F` carries the return and argument types of the binding.
///
/// # Safety
///
/// `F` must be an `extern` function pointer type whose signature and calling
/// convention match the native definition of `symbol`.
pub unsafe fn bind_symbol<F: Copy>(lookup: &impl SymbolLookup, library: &str, symbol: &str) -> Result<F> {
    if mem::size_of::<F>() != mem::size_of::<*mut c_void>() {
        return Err(TimerError::invalid(format!("`{symbol}` cannot be bound to a non-pointer type")));
    }

    let address = lookup.resolve(library, symbol)?;
    debug!(library, symbol, ?address, "bound native symbol");

    // SAFETY: sizes match and the caller vouches for the signature
    Ok(unsafe { mem::transmute_copy::<*mut c_void, F>(&address.as_ptr()) })
}

/// Resolve `symbol` from the first library in `libraries` that exports it
///
/// # Safety
///
/// Same contract as [`bind_symbol`].
pub unsafe fn bind_any<F: Copy>(lookup: &impl SymbolLookup, libraries: &[&str], symbol: &str) -> Result<F> {
    let mut last = TimerError::LibraryNotFound {
        library: libraries.join(", "),
        reason: "no candidate libraries".to_owned(),
    };
    for library in libraries {
        // SAFETY: forwarded from the caller
        match unsafe { bind_symbol(lookup, library, symbol) } {
            Ok(function) => return Ok(function),
            Err(err @ (TimerError::LibraryNotFound { .. } | TimerError::SymbolNotFound { .. })) => last = err,
            Err(err) => return Err(err),
        }
    }
    Err(last)
}

/// Lookup backed by the operating system's dynamic loader.
///
/// Libraries opened here stay loaded for the rest of the process, since the
/// bound function pointers are cached for that long.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLoader;

#[cfg(unix)]
impl SymbolLookup for SystemLoader {
    fn resolve(&self, library: &str, symbol: &str) -> Result<NonNull<c_void>> {
        use std::ffi::{CStr, CString};

        let c_library = CString::new(library).map_err(|_| TimerError::invalid(format!("library name {library:?} contains a nul byte")))?;
        let c_symbol = CString::new(symbol).map_err(|_| TimerError::invalid(format!("symbol name {symbol:?} contains a nul byte")))?;

        let dlerror = || {
            // SAFETY: dlerror returns null or a thread-local C string
            let message = unsafe { libc::dlerror() };
            if message.is_null() {
                "unknown error".to_owned()
            } else {
                unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned()
            }
        };

        let handle = unsafe { libc::dlopen(c_library.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        if handle.is_null() {
            return Err(TimerError::LibraryNotFound {
                library: library.to_owned(),
                reason: dlerror(),
            });
        }

        let address = unsafe { libc::dlsym(handle, c_symbol.as_ptr()) };
        NonNull::new(address).ok_or_else(|| TimerError::SymbolNotFound {
            library: library.to_owned(),
            symbol: symbol.to_owned(),
        })
    }
}

#[cfg(windows)]
impl SymbolLookup for SystemLoader {
    fn resolve(&self, library: &str, symbol: &str) -> Result<NonNull<c_void>> {
        use {
            std::ffi::CString,
            windows::{
                Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW},
                core::{HSTRING, PCSTR},
            },
        };

        let c_symbol = CString::new(symbol).map_err(|_| TimerError::invalid(format!("symbol name {symbol:?} contains a nul byte")))?;

        let module = unsafe { LoadLibraryW(&HSTRING::from(library)) }.map_err(|err| TimerError::LibraryNotFound {
            library: library.to_owned(),
            reason: err.message().to_string(),
        })?;

        let address = unsafe { GetProcAddress(module, PCSTR::from_raw(c_symbol.as_ptr().cast())) };
        address
            .and_then(|function| NonNull::new(function as *mut c_void))
            .ok_or_else(|| TimerError::SymbolNotFound {
                library: library.to_owned(),
                symbol: symbol.to_owned(),
            })
    }
}

#[cfg(not(any(unix, windows)))]
impl SymbolLookup for SystemLoader {
    fn resolve(&self, library: &str, _symbol: &str) -> Result<NonNull<c_void>> {
        Err(TimerError::LibraryNotFound {
            library: library.to_owned(),
            reason: "no dynamic loader on this platform".to_owned(),
        })
    }
}

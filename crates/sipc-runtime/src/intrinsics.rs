//! The five runtime collaborators every compiled SIP module links against
//! (6): `_tip_input`/`_tip_output`/`_tip_error`/`_tip_main_undefined` are
//! defined here; `calloc` is resolved straight against libc, no wrapper
//! needed. This module also provides the process's actual C `main`, which
//! stages `argv` into `_tip_input_array` before handing off to the
//! compiled module's `_tip_main` - there is no argv in the language, so
//! this is the only place a SIP program's `main` parameters are ever
//! populated from the command line.

use std::io::{self, Write};

#[cfg(not(test))]
use std::ffi::CStr;
#[cfg(not(test))]
use std::os::raw::{c_char, c_int};

/// Reads one whitespace-delimited integer from stdin, per program (9's
/// "Input" scenario). A malformed or exhausted stream is a runtime error,
/// not a panic - SIP programs have no way to recover from it either way, so
/// this matches `_tip_error`'s own fail-fast behavior.
#[no_mangle]
pub extern "C" fn _tip_input() -> i64 {
    let mut line = String::new();
    loop {
        line.clear();
        match io::stdin().read_line(&mut line) {
            Ok(0) => {
                eprintln!("sip: input exhausted");
                std::process::exit(1);
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match trimmed.parse::<i64>() {
                    Ok(n) => return n,
                    Err(_) => {
                        eprintln!("sip: expected an integer, got '{trimmed}'");
                        std::process::exit(1);
                    }
                }
            }
            Err(e) => {
                eprintln!("sip: failed to read input: {e}");
                std::process::exit(1);
            }
        }
    }
}

/// `output E;` - writes the value followed by a newline, flushing
/// immediately so output interleaves correctly with `_tip_input` prompts.
#[no_mangle]
pub extern "C" fn _tip_output(value: i64) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = writeln!(handle, "{value}");
    let _ = handle.flush();
}

/// `error E;` and every trapped runtime violation (bounds, division by
/// zero) route through here before the process exits non-zero (7).
#[no_mangle]
pub extern "C" fn _tip_error(code: i64) {
    eprintln!("sip: runtime error (code {code})");
    std::process::exit(1);
}

/// Linked in when a program has no `main` function; the driver still
/// produces a binary so this can be the thing that actually reports the
/// problem at run time rather than link time.
#[no_mangle]
pub extern "C" fn _tip_main_undefined() {
    eprintln!("sip: program has no 'main' function");
    std::process::exit(1);
}

// The process entry point references symbols the compiled SIP module
// provides (`_tip_main`, `_tip_num_inputs`, `_tip_input_array`), which don't
// exist when this crate is linked as an rlib for its own unit tests - and a
// second `extern "C" fn main` would collide with the test harness's. Both
// the externs and the entry point are staticlib-only.
#[cfg(not(test))]
extern "C" {
    /// Defined by the compiled module, not by this crate.
    fn _tip_main() -> i64;

    /// Also defined by the compiled module (`context::declare_input_staging`):
    /// a constant giving `_tip_input_array`'s length, and the array itself.
    static _tip_num_inputs: i64;
    static mut _tip_input_array: [i64; 0];
}

/// The process entry point. Parses up to `_tip_num_inputs` leading
/// command-line arguments as integers into `_tip_input_array`, then calls
/// the compiled module's `main`. Extra `argv` entries beyond what `main`
/// declares are ignored; missing ones are left zeroed.
#[cfg(not(test))]
#[no_mangle]
pub extern "C" fn main(argc: c_int, argv: *const *const c_char) -> c_int {
    stage_inputs(argc, argv);
    unsafe { _tip_main() as c_int }
}

/// `argv[0]` is the program name, so `main`'s Nth SIP parameter comes from
/// `argv[N + 1]`; arguments beyond what the user passed stay zero-initialized.
#[cfg(not(test))]
fn stage_inputs(argc: c_int, argv: *const *const c_char) {
    let num_inputs = unsafe { _tip_num_inputs } as usize;
    let supplied = (argc.max(1) as usize).saturating_sub(1);

    for i in 0..num_inputs {
        if i >= supplied {
            break;
        }
        let c_str = unsafe { CStr::from_ptr(*argv.add(i + 1)) };
        let value = match c_str.to_str().ok().and_then(|s| s.parse::<i64>().ok()) {
            Some(v) => v,
            None => {
                eprintln!(
                    "sip: expected an integer argument, got '{}'",
                    c_str.to_string_lossy()
                );
                std::process::exit(1);
            }
        };
        unsafe {
            *std::ptr::addr_of_mut!(_tip_input_array).cast::<i64>().add(i) = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_does_not_panic() {
        _tip_output(42);
        _tip_output(-7);
    }
}

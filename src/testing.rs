//! TAP (Test Anything Protocol) harness for on-device test runs.
//!
//! `cargo test` cannot run on the camera board, so tests that should also run
//! there are marked `#[tap_test]` and collected into the `device-tests`
//! binary, which prints TAP over the serial console. Only compiled with the
//! `tap-tests` feature.
//!
//! ```ignore
//! #[cfg(feature = "tap-tests")]
//! mod tap_tests {
//!     use esp32_cam_node_macros::tap_test;
//!
//!     #[tap_test]
//!     fn tiers_are_ordered() {
//!         assert!(FrameSize::Qvga < FrameSize::Uxga);
//!     }
//!
//!     #[tap_test(should_panic = "index out of bounds")]
//!     fn out_of_range_panics() {
//!         let _ = [0u8; 1][usize::MAX];
//!     }
//! }
//! ```

use std::io::{self, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Registry the `#[tap_test]` expansion submits to.
#[doc(hidden)]
pub use inventory;

/// What a test body returns.
pub type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// How a case is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Returns `Ok` without panicking.
    Pass,
    /// Panics, optionally with a message containing the given text.
    Panic(Option<&'static str>),
}

/// One registered test. Built by `#[tap_test]`.
pub struct TapCase {
    pub name: &'static str,
    pub module: &'static str,
    pub expect: Expect,
    pub body: fn() -> TestResult,
}

inventory::collect!(TapCase);

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl TapCase {
    /// Run the body and judge it. `Err` carries the diagnostic line.
    pub fn evaluate(&self) -> Result<(), String> {
        let outcome = catch_unwind(AssertUnwindSafe(self.body));
        match (self.expect, outcome) {
            (Expect::Pass, Ok(Ok(()))) => Ok(()),
            (Expect::Pass, Ok(Err(e))) => Err(format!("Error: {}", e)),
            (Expect::Pass, Err(payload)) => Err(format!("Panic: {}", panic_message(&*payload))),
            (Expect::Panic(_), Ok(_)) => Err("Expected panic but test completed normally".into()),
            (Expect::Panic(None), Err(_)) => Ok(()),
            (Expect::Panic(Some(expected)), Err(payload)) => {
                let msg = panic_message(&*payload);
                if msg.contains(expected) {
                    Ok(())
                } else {
                    Err(format!("Expected panic containing '{}', got '{}'", expected, msg))
                }
            }
        }
    }
}

/// Writes TAP version 14 to any sink.
pub struct TapRunner<W: Write> {
    out: W,
    run: usize,
    failed: usize,
}

impl<W: Write> TapRunner<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            run: 0,
            failed: 0,
        }
    }

    /// Header and plan line.
    pub fn plan(&mut self, count: usize) -> io::Result<()> {
        writeln!(self.out, "TAP version 14")?;
        writeln!(self.out, "1..{}", count)
    }

    pub fn run_case(&mut self, case: &TapCase) -> io::Result<()> {
        self.run += 1;
        let short = case.module.split_once("::").map_or(case.module, |(_, rest)| rest);
        match case.evaluate() {
            Ok(()) => writeln!(self.out, "ok {} - {}::{}", self.run, short, case.name),
            Err(diagnostic) => {
                self.failed += 1;
                writeln!(self.out, "not ok {} - {}::{}", self.run, short, case.name)?;
                writeln!(self.out, "# {}", diagnostic)
            }
        }
    }

    /// Summary comments. True if nothing failed.
    pub fn finish(&mut self) -> io::Result<bool> {
        writeln!(self.out, "# Tests run: {}", self.run)?;
        writeln!(self.out, "# Passed: {}", self.run - self.failed)?;
        writeln!(self.out, "# Failed: {}", self.failed)?;
        let passed = self.failed == 0;
        writeln!(self.out, "# Result: {}", if passed { "PASS" } else { "FAIL" })?;
        self.out.flush()?;
        Ok(passed)
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Run every registered case, printing to stdout.
pub fn run_all_tests() -> bool {
    let mut cases: Vec<&TapCase> = inventory::iter::<TapCase>.into_iter().collect();
    cases.sort_by_key(|case| (case.module, case.name));

    let mut runner = TapRunner::new(io::stdout().lock());
    let result = (|| {
        runner.plan(cases.len())?;
        for case in &cases {
            runner.run_case(case)?;
        }
        runner.finish()
    })();
    result.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(expect: Expect, body: fn() -> TestResult) -> TapCase {
        TapCase {
            name: "case",
            module: "esp32_cam_node::testing",
            expect,
            body,
        }
    }

    fn output(cases: &[TapCase]) -> (String, bool) {
        let mut runner = TapRunner::new(Vec::new());
        runner.plan(cases.len()).unwrap();
        for c in cases {
            runner.run_case(c).unwrap();
        }
        let passed = runner.finish().unwrap();
        (String::from_utf8(runner.into_inner()).unwrap(), passed)
    }

    #[test]
    fn test_passing_case() {
        let (out, passed) = output(&[case(Expect::Pass, || Ok(()))]);
        assert!(passed);
        assert!(out.starts_with("TAP version 14\n1..1\n"));
        assert!(out.contains("ok 1 - testing::case"));
    }

    #[test]
    fn test_error_and_panic_fail() {
        let (out, passed) = output(&[
            case(Expect::Pass, || Err("boom".into())),
            case(Expect::Pass, || panic!("kaboom")),
        ]);
        assert!(!passed);
        assert!(out.contains("not ok 1 - testing::case\n# Error: boom"));
        assert!(out.contains("not ok 2 - testing::case\n# Panic: kaboom"));
    }

    #[test]
    fn test_expected_panic() {
        assert!(case(Expect::Panic(None), || panic!("any")).evaluate().is_ok());
        assert!(case(Expect::Panic(Some("tier")), || panic!("bad tier"))
            .evaluate()
            .is_ok());
        assert!(case(Expect::Panic(Some("tier")), || panic!("other"))
            .evaluate()
            .is_err());
        assert!(case(Expect::Panic(None), || Ok(())).evaluate().is_err());
    }
}

// Self-checks that also run on the device
mod tap_tests {
    use super::*;
    use esp32_cam_node_macros::tap_test;

    #[tap_test]
    fn runner_counts_failures() {
        let mut runner = TapRunner::new(Vec::new());
        let failing = TapCase {
            name: "failing",
            module: module_path!(),
            expect: Expect::Pass,
            body: || Err("expected".into()),
        };
        runner.run_case(&failing).unwrap();
        assert_eq!(runner.failed(), 1);
        assert!(!runner.finish().unwrap());
    }

    #[tap_test(should_panic = "deliberate")]
    fn should_panic_is_honoured() {
        panic!("deliberate");
    }
}

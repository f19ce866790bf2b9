pub use std::backtrace::Backtrace;

pub use anyhow::{
    anyhow,
    bail,
    ensure,
};
pub use paste::paste;
pub use regex::{
    Regex,
    RegexBuilder,
};
pub use thiserror::Error;

pub type EmptyResult = anyhow::Result<()>;

pub const BUILD_DIR: &str = "/.build/";
pub const RUSTC_DIR: &str = "/rustc/";
pub const CARGO_REGISTRY_DIR: &str = "/.cargo/registry/";
pub const GLIBC: &str = "glibc";

// This macro creates an enum which derives from thiserror::Error, and also creates constructor
// functions in snake case for each of the enum variants, so that call sites can just write
// `bail!(ClientError::not_found(&name))`.
#[macro_export]
macro_rules! err_impl {
    (@hidden $errtype:ident, $item:ident, String) => {
        paste! {
            pub fn [<$item:snake>](in_: &str) -> anyhow::Error {
                anyhow!{$errtype::$item(in_.into())}
            }
        }
    };

    (@hidden $errtype:ident, $item:ident, $($dtype:tt)::+) => {
        paste! {
            pub fn [<$item:snake>](in_: &$($dtype)::+) -> anyhow::Error {
                anyhow!{$errtype::$item(in_.clone())}
            }
        }
    };

    ($errtype:ident,
        $(#[$errinfo:meta] $item:ident($($dtype:tt)::+),)+
    ) => {
        #[derive(Debug, Error)]
        pub enum $errtype {
            $(#[$errinfo] $item($($dtype)::+)),+
        }

        impl $errtype {
            $(err_impl! {@hidden $errtype, $item, $($dtype)::+})+
        }
    };
}

// Reconcile errors bubble up through several layers of tokio and kube-runtime machinery, and the
// raw backtrace is mostly noise; this keeps only the frames from our own code.
pub fn prune_backtrace(bt: &str) -> String {
    let Ok(re) = RegexBuilder::new(r"^\s+\d+(?s:.*?)(\s+at\s+.*:\d+)$").multi_line(true).build() else {
        return bt.into();
    };

    let mut skipped_frames = 0;
    let mut filtered_bt = re.find_iter(bt).fold(String::new(), |mut acc, frame| {
        let frame = frame.as_str();
        if frame.contains(BUILD_DIR)
            || frame.contains(RUSTC_DIR)
            || frame.contains(CARGO_REGISTRY_DIR)
            || frame.contains(GLIBC)
        {
            skipped_frames += 1;
        } else if !frame.is_empty() {
            acc += &skipped_marker(skipped_frames);
            acc += &format!("{frame}\n");
            skipped_frames = 0;
        }
        acc
    });
    filtered_bt += skipped_marker(skipped_frames).trim_end();
    filtered_bt
}

fn skipped_marker(skipped_frames: usize) -> String {
    match skipped_frames {
        0 => String::new(),
        1 => "      -- <skipped 1 frame> --\n".into(),
        n => format!("      -- <skipped {n} frames> --\n"),
    }
}

#[macro_export]
macro_rules! lmerr {
    (@hidden $err:ident, $msg:literal, $($args:expr),*) => {
        let filtered_bt = $crate::errors::prune_backtrace(&$err.backtrace().to_string());
        tracing::error!(concat!($msg, "\n\n{}\n\nPartial Stack Trace:\n\n{}\n\n") $(, $args)*, $err, filtered_bt);
    };

    ($err:ident, $msg:literal) => {
        lmerr! {@hidden $err, $msg, };
    };

    ($err:ident, $msg:literal, $($args:expr),*) => {
        lmerr! {@hidden $err, $msg, $($args),*};
    };
}

pub use {
    err_impl,
    lmerr,
};

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;

    err_impl! {TestError,
        #[error("widget {0} is broken")]
        BrokenWidget(String),
    }

    #[rstest]
    fn test_err_impl_constructor() {
        let err = TestError::broken_widget("foo");
        assert_eq!(err.to_string(), "widget foo is broken");
        assert!(matches!(err.downcast_ref::<TestError>(), Some(TestError::BrokenWidget(_))));
    }

    #[rstest]
    fn test_prune_backtrace() {
        let bt = "   0: lm_ctrl::reconcile\n             at /src/lm-ctrl/src/kyma/mod.rs:12\n   1: tokio::runtime::task\n             at /home/user/.cargo/registry/src/tokio/src/task.rs:55\n   2: tokio::runtime::park\n             at /home/user/.cargo/registry/src/tokio/src/park.rs:10";
        let pruned = prune_backtrace(bt);
        assert!(pruned.contains("lm-ctrl/src/kyma/mod.rs:12"));
        assert!(!pruned.contains("task.rs"));
        assert!(pruned.ends_with("-- <skipped 2 frames> --"));
    }
}

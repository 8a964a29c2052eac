//! Process-wide hooks for events nobody handled.
//!
//! Two situations reach these hooks:
//!
//! - A terminate-kind event escapes a context's entry point, or an event
//!   that cannot be duplicated is raised asynchronously. Both are fatal: the
//!   terminate hook receives a [`FatalReport`], and the runtime aborts the
//!   process afterwards unless configured otherwise.
//! - A resume-kind event delivered from the mailbox matches no handler. This
//!   is not fatal; the unhandled-resume hook is notified and delivery goes on.
//!
//! Without an installed hook, fatal reports are written to stderr as a single
//! diagnostic line and unhandled resumptions are logged at debug level.

use core::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::event::EventInfo;
use crate::tracing_compat::{debug, error};
use crate::types::ContextId;

/// Callback for fatal reports.
pub type TerminateHook = Arc<dyn Fn(&FatalReport) + Send + Sync>;

/// Callback for unhandled resumptions.
pub type UnhandledResumeHook = Arc<dyn Fn(&EventInfo) + Send + Sync>;

struct Hooks {
    terminate: Option<TerminateHook>,
    unhandled_resume: Option<UnhandledResumeHook>,
}

static HOOKS: RwLock<Hooks> = parking_lot::const_rwlock(Hooks {
    terminate: None,
    unhandled_resume: None,
});

/// Why a report is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FatalReason {
    /// A terminate-kind event left a context's entry point.
    Uncaught,
    /// An event without duplication support was raised asynchronously.
    DuplicationUnsupported,
}

/// Everything needed to locate a fatal fault without a debugger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalReport {
    /// What went wrong.
    pub reason: FatalReason,
    /// The context in which the fault became fatal.
    pub context: ContextId,
    /// Name of that context.
    pub context_name: String,
    /// The offending event.
    pub event: EventInfo,
}

impl fmt::Display for FatalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = self
            .event
            .source
            .map_or_else(|| String::from("*unknown*"), |id| format!("{id:?}"));
        match self.reason {
            FatalReason::Uncaught => write!(
                f,
                "uncaught event {} raised by \"{}\" ({}): {}",
                self.event.type_name, self.event.source_name, source, self.event.message
            ),
            FatalReason::DuplicationUnsupported => write!(
                f,
                "event {} raised asynchronously by \"{}\" ({:?}) cannot be duplicated: {}",
                self.event.type_name, self.context_name, self.context, self.event.message
            ),
        }
    }
}

/// Installs the hook called for every fatal report.
pub fn set_terminate_hook<F>(hook: F)
where
    F: Fn(&FatalReport) + Send + Sync + 'static,
{
    HOOKS.write().terminate = Some(Arc::new(hook));
}

/// Installs the hook called for every unhandled mailbox resumption.
pub fn set_unhandled_resume_hook<F>(hook: F)
where
    F: Fn(&EventInfo) + Send + Sync + 'static,
{
    HOOKS.write().unhandled_resume = Some(Arc::new(hook));
}

/// Restores the default behavior of both hooks.
pub fn reset_hooks() {
    let mut hooks = HOOKS.write();
    hooks.terminate = None;
    hooks.unhandled_resume = None;
}

/// Delivers a fatal report; the caller decides whether to abort.
pub(crate) fn report_fatal(report: &FatalReport) {
    error!(
        context = %report.context,
        reason = ?report.reason,
        event = %report.event.type_name,
        "fatal event"
    );
    // The hook runs outside the lock so it may reinstall hooks.
    let hook = HOOKS.read().terminate.clone();
    match hook {
        Some(hook) => hook(report),
        None => eprintln!("{report}"),
    }
}

pub(crate) fn report_unhandled_resume(info: &EventInfo) {
    let hook = HOOKS.read().unhandled_resume.clone();
    match hook {
        Some(hook) => hook(info),
        None => debug!(event = %info.type_name, message = %info.message, "resumption not handled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RaiseKind;
    use crate::test_utils::hook_lock;
    use crate::types::TypeTag;
    use std::sync::Mutex;

    fn info(source: Option<ContextId>) -> EventInfo {
        EventInfo {
            tag: TypeTag::ROOT,
            type_name: "Overflow".into(),
            message: "counter wrapped".into(),
            source,
            source_name: "worker".into(),
            kind: Some(RaiseKind::Terminate),
        }
    }

    #[test]
    fn uncaught_report_line() {
        let report = FatalReport {
            reason: FatalReason::Uncaught,
            context: ContextId::new_for_test(1, 0),
            context_name: "worker".into(),
            event: info(Some(ContextId::new_for_test(1, 0))),
        };
        assert_eq!(
            report.to_string(),
            "uncaught event Overflow raised by \"worker\" (ContextId(1:0)): counter wrapped"
        );
    }

    #[test]
    fn duplication_report_line() {
        let report = FatalReport {
            reason: FatalReason::DuplicationUnsupported,
            context: ContextId::new_for_test(2, 3),
            context_name: "sender".into(),
            event: info(None),
        };
        assert!(report.to_string().contains("cannot be duplicated"));
        assert!(report.to_string().contains("\"sender\" (ContextId(2:3))"));
    }

    #[test]
    fn installed_hooks_receive_reports() {
        let _guard = hook_lock();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        set_terminate_hook(move |r| sink.lock().unwrap().push(r.event.message.clone()));
        let resumed = Arc::new(Mutex::new(0));
        let count = Arc::clone(&resumed);
        set_unhandled_resume_hook(move |_| *count.lock().unwrap() += 1);

        report_fatal(&FatalReport {
            reason: FatalReason::Uncaught,
            context: ContextId::new_for_test(0, 0),
            context_name: "main".into(),
            event: info(None),
        });
        report_unhandled_resume(&info(None));
        reset_hooks();
        report_unhandled_resume(&info(None));

        assert_eq!(*seen.lock().unwrap(), vec!["counter wrapped".to_string()]);
        assert_eq!(*resumed.lock().unwrap(), 1);
    }
}

//! Conversion of automation faults into typed errors.
//!
//! Every call into an [`Automation`](crate::automation::Automation) binding
//! goes through [`Guarded::guard`], so no [`Fault`] leaves the adapter
//! unconverted. Faults describing the external store (missing object, stale
//! handle, access denied, busy) always become store errors. Argument-shape
//! faults become [`Error::InvalidArgument`] and are never disguised as a
//! store condition.

use log::debug;

use crate::automation::{Fault, FaultKind, Variant};
use crate::error::{Error, Result};

/// Attach operation context to a binding result.
pub(crate) trait Guarded<T> {
    fn guard(self, op: &'static str, target: &str) -> Result<T>;
}

impl<T> Guarded<T> for std::result::Result<T, Fault> {
    fn guard(self, op: &'static str, target: &str) -> Result<T> {
        self.map_err(|fault| translate(fault, op, target))
    }
}

/// Read of a property that may be absent: a missing property is an empty
/// value, not an error.
pub(crate) fn optional(
    result: std::result::Result<Variant, Fault>,
    op: &'static str,
    target: &str,
) -> Result<Variant> {
    match result {
        Err(fault) if fault.kind == FaultKind::PropertyMissing => Ok(Variant::Empty),
        other => other.guard(op, target),
    }
}

/// Map a fault onto the error taxonomy.
pub fn translate(fault: Fault, op: &'static str, target: &str) -> Error {
    debug!("{op} {target}: fault {fault}");
    let detail = fault.to_string();
    let target = target.to_string();
    match fault.kind {
        FaultKind::InvalidArgument => Error::InvalidArgument { op, detail },
        FaultKind::NotFound | FaultKind::StaleHandle | FaultKind::PropertyMissing => {
            Error::NotFound { op, target, detail }
        }
        FaultKind::AccessDenied => Error::Access { op, target, detail },
        FaultKind::Busy | FaultKind::Unavailable | FaultKind::Other => {
            Error::Transient { op, target, detail }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fault(kind: FaultKind) -> std::result::Result<(), Fault> {
        Err(Fault::new(kind, "boom"))
    }

    #[test]
    fn test_store_faults_are_converted() {
        assert!(matches!(
            fault(FaultKind::NotFound).guard("get", "msg-1"),
            Err(Error::NotFound { op: "get", ref target, .. }) if target == "msg-1"
        ));
        assert!(matches!(
            fault(FaultKind::StaleHandle).guard("list", "Spam"),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            fault(FaultKind::AccessDenied).guard("set_read", "msg-1"),
            Err(Error::Access { .. })
        ));
        assert!(matches!(
            fault(FaultKind::Busy).guard("move", "msg-1"),
            Err(Error::Transient { .. })
        ));
        assert!(matches!(
            fault(FaultKind::Other).guard("move", "msg-1"),
            Err(Error::Transient { .. })
        ));
    }

    #[test]
    fn test_argument_faults_stay_programmer_errors() {
        let err = fault(FaultKind::InvalidArgument)
            .guard("set_category", "msg-1")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { op: "set_category", .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_success_passes_through() {
        let ok: std::result::Result<u32, Fault> = Ok(7);
        assert_eq!(ok.guard("count", "Inbox").unwrap(), 7);
    }

    #[test]
    fn test_optional_property() {
        let missing = Err(Fault::new(FaultKind::PropertyMissing, "no such property"));
        assert_eq!(optional(missing, "get", "msg-1").unwrap(), Variant::Empty);

        let present = Ok(Variant::Text("Hi".into()));
        assert_eq!(
            optional(present, "get", "msg-1").unwrap(),
            Variant::Text("Hi".into())
        );

        let gone = Err(Fault::new(FaultKind::NotFound, "gone"));
        assert!(matches!(
            optional(gone, "get", "msg-1"),
            Err(Error::NotFound { .. })
        ));
    }
}

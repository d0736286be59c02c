use facet::Facet;
use std::fmt;

use crate::LockId;

/// A lock as it appears in a report.
///
/// `id` is `None` when the tracker groups locks by name, since the report
/// then speaks about every instance carrying that name.
#[derive(Facet, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockLabel {
    pub name: String,
    pub id: Option<LockId>,
}

impl LockLabel {
    pub fn instance(id: LockId, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: Some(id),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
        }
    }
}

impl fmt::Display for LockLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{} ({id})", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A new acquired-before edge closed a cycle in the lock-order graph.
///
/// `cycle` starts at `held`, goes through `acquiring`, follows previously
/// recorded edges and ends at `held` again.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Name of the thread whose acquisition closed the cycle.
    pub thread: String,
    pub held: LockLabel,
    pub acquiring: LockLabel,
    pub cycle: Vec<LockLabel>,
    /// Where the closing acquisition happened, when backtrace capture is on.
    pub backtrace: Option<String>,
}

impl CycleReport {
    pub fn cycle_names(&self) -> Vec<&str> {
        self.cycle.iter().map(|label| label.name.as_str()).collect()
    }

    pub fn to_json(&self) -> Result<String, String> {
        facet_json::to_string(self).map_err(|e| e.to_string())
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "thread {} acquiring {} while holding {} closes lock-order cycle ",
            self.thread, self.acquiring, self.held
        )?;
        for (i, label) in self.cycle.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            f.write_str(&label.name)?;
        }
        Ok(())
    }
}

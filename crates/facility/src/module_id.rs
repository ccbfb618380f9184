//! Canonical tuple representation of a dotted module path.

/// An ordered tuple of path segments, always starting with the synthetic
/// root segment `"root"`.
///
/// Parsing rule: split the dotted input on `.`, discard empty segments,
/// then prepend `"root"` unless the first surviving segment already is
/// `"root"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(Vec<String>);

impl ModuleId {
    /// Parses a dotted module path into its canonical tuple form.
    pub fn parse(s: &str) -> Self {
        let mut segments: Vec<String> = s
            .split('.')
            .filter(|seg| !seg.is_empty())
            .map(str::to_owned)
            .collect();

        if segments.first().map(String::as_str) != Some("root") {
            segments.insert(0, "root".to_owned());
        }

        ModuleId(segments)
    }

    /// The root module id, `("root",)`.
    pub fn root() -> Self {
        ModuleId(vec!["root".to_owned()])
    }

    /// Renders the tuple back to its dotted form.
    ///
    /// The synthetic root segment is dropped unless it is the only
    /// segment present, in which case it is rendered literally as
    /// `"root"` (matching the reference implementation this daemon is
    /// modeled on: a bare root facility's module string is the literal
    /// text `root`, not the empty string).
    pub fn pretty(&self) -> String {
        if self.0.len() > 1 {
            self.0[1..].join(".")
        } else {
            self.0.join(".")
        }
    }

    /// Number of segments, including the synthetic root.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is exactly the root tuple.
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Returns the parent prefix (one segment shorter), or `None` if this
    /// is already the root.
    pub fn parent(&self) -> Option<ModuleId> {
        if self.is_root() {
            None
        } else {
            Some(ModuleId(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Iterates this id and every ancestor, longest prefix first, ending
    /// at the root.
    pub fn prefixes(&self) -> impl Iterator<Item = ModuleId> + '_ {
        let mut current = Some(self.clone());
        std::iter::from_fn(move || {
            let next = current.take()?;
            current = next.parent();
            Some(next)
        })
    }
}

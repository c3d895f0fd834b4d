//! Content filter options.
//!
//! A filter is a predicate expression evaluated by the transport before
//! delivery; the core never interprets it. Parameters are substituted
//! positionally into `%0`, `%1`, ... placeholders by the transport.

/// Owned filter expression plus positional parameters.
///
/// Construction copies the expression and parameters; releasing them is
/// `Drop`. An empty expression is the canonical "no filtering" value and is
/// how an applied filter gets cleared.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentFilterOptions {
    expression: String,
    parameters: Vec<String>,
}

impl ContentFilterOptions {
    /// Build filter options from an expression and its positional
    /// parameters.
    pub fn new(
        expression: impl Into<String>,
        parameters: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            expression: expression.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
        }
    }

    /// The canonical clearing value: an empty expression with no
    /// parameters. Applying it transitions a filtered subscription back to
    /// unfiltered.
    pub fn clearing() -> Self {
        Self::default()
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// True when the expression is empty, i.e. this value clears filtering
    /// rather than establishing it.
    pub fn is_empty(&self) -> bool {
        self.expression.is_empty()
    }
}

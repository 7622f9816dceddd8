//! Scope-local collection points for sibling trace fragments.

use crate::trace::TraceNode;

/// Ordered fragments gathered while walking a construct's children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bucket {
    fragments: Vec<TraceNode>,
}

impl Bucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: TraceNode) {
        self.fragments.push(fragment);
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn fragments(&self) -> &[TraceNode] {
        &self.fragments
    }

    /// Take every fragment in source order, leaving the bucket empty.
    pub fn drain(&mut self) -> Vec<TraceNode> {
        std::mem::take(&mut self.fragments)
    }

    /// Consume the bucket expecting at most one fragment.
    ///
    /// Returns the fragment count on failure so the caller can report it.
    pub fn into_single(mut self) -> Result<Option<TraceNode>, usize> {
        match self.fragments.len() {
            0 => Ok(None),
            1 => Ok(self.fragments.pop()),
            n => Err(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_order_and_empties() {
        let mut b = Bucket::new();
        b.push(TraceNode::Skip);
        b.push(TraceNode::Stop);
        assert_eq!(b.drain(), vec![TraceNode::Skip, TraceNode::Stop]);
        assert!(b.is_empty());
    }

    #[test]
    fn into_single_reports_excess() {
        assert_eq!(Bucket::new().into_single(), Ok(None));

        let mut one = Bucket::new();
        one.push(TraceNode::Div);
        assert_eq!(one.into_single(), Ok(Some(TraceNode::Div)));

        let mut two = Bucket::new();
        two.push(TraceNode::Skip);
        two.push(TraceNode::Skip);
        assert_eq!(two.into_single(), Err(2));
    }
}

use crate::replica::peers::ReplicaId;
use std::fmt;

/// Term is the logical election epoch. A higher term always supersedes a lower one.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) struct Term(u64);

impl Term {
    pub(crate) fn new(term: u64) -> Self {
        Term(term)
    }

    pub(crate) fn as_u64(&self) -> u64 {
        self.0
    }

    fn incr(&mut self) {
        self.0 += 1;
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// PersistentLocalState holds the term and vote of this replica. These are the only two values
/// the election algorithm needs to survive a restart to stay safe.
///
/// Store methods are CAS-like: they return true iff they mutated state.
pub(crate) trait PersistentLocalState: Send {
    /// Set current term to `new_term` iff it is larger than current term. Clears the vote.
    fn store_term_if_increased(&mut self, new_term: Term) -> bool;

    /// Store our vote iff `expected_current_term` is still the current term and we haven't
    /// voted in it yet.
    fn store_vote_for_term_if_unvoted(&mut self, expected_current_term: Term, vote: ReplicaId) -> bool;

    /// Return the new term. Used when transitioning to candidate.
    fn increment_term_and_vote_for_self(&mut self) -> Term;

    fn current_term(&self) -> Term;
    fn voted_for_current_term(&self) -> (Term, Option<ReplicaId>);
}

// Term and vote only live in memory. A restarted replica rejoins at term 0 and catches up on the
// first heartbeat or vote request it sees.
pub(crate) struct VolatileLocalState {
    my_replica_id: ReplicaId,
    current_term: Term,
    voted_for: Option<ReplicaId>,
}

impl VolatileLocalState {
    pub(crate) fn new(my_replica_id: ReplicaId) -> Self {
        VolatileLocalState {
            my_replica_id,
            current_term: Term::new(0),
            voted_for: None,
        }
    }
}

impl PersistentLocalState for VolatileLocalState {
    fn store_term_if_increased(&mut self, new_term: Term) -> bool {
        if new_term <= self.current_term {
            return false;
        }

        self.current_term = new_term;
        self.voted_for = None;
        true
    }

    fn store_vote_for_term_if_unvoted(&mut self, expected_current_term: Term, vote: ReplicaId) -> bool {
        if expected_current_term != self.current_term || self.voted_for.is_some() {
            return false;
        }

        self.voted_for = Some(vote);
        true
    }

    fn increment_term_and_vote_for_self(&mut self) -> Term {
        self.current_term.incr();
        self.voted_for = Some(self.my_replica_id.clone());

        self.current_term
    }

    fn current_term(&self) -> Term {
        self.current_term
    }

    fn voted_for_current_term(&self) -> (Term, Option<ReplicaId>) {
        (self.current_term, self.voted_for.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> VolatileLocalState {
        VolatileLocalState::new(ReplicaId::new("me"))
    }

    #[test]
    fn term_only_moves_forward() {
        let mut s = state();
        assert!(s.store_term_if_increased(Term::new(5)));
        assert!(!s.store_term_if_increased(Term::new(5)));
        assert!(!s.store_term_if_increased(Term::new(3)));
        assert_eq!(s.current_term(), Term::new(5));
    }

    #[test]
    fn vote_is_cleared_on_new_term() {
        let mut s = state();
        s.store_term_if_increased(Term::new(2));
        assert!(s.store_vote_for_term_if_unvoted(Term::new(2), ReplicaId::new("a")));
        assert!(!s.store_vote_for_term_if_unvoted(Term::new(2), ReplicaId::new("b")));

        s.store_term_if_increased(Term::new(3));
        assert_eq!(s.voted_for_current_term(), (Term::new(3), None));
        assert!(s.store_vote_for_term_if_unvoted(Term::new(3), ReplicaId::new("b")));
    }

    #[test]
    fn vote_for_wrong_term_is_refused() {
        let mut s = state();
        s.store_term_if_increased(Term::new(2));
        assert!(!s.store_vote_for_term_if_unvoted(Term::new(1), ReplicaId::new("a")));
        assert!(!s.store_vote_for_term_if_unvoted(Term::new(3), ReplicaId::new("a")));
    }

    #[test]
    fn candidate_votes_for_itself() {
        let mut s = state();
        let term = s.increment_term_and_vote_for_self();
        assert_eq!(term, Term::new(1));
        assert_eq!(s.voted_for_current_term(), (Term::new(1), Some(ReplicaId::new("me"))));
    }
}

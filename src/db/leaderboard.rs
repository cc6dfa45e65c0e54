use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::db::MentionCounts;

/// A `(user, count)` pair; serializes as a two-element JSON array, e.g. `["alice", 3]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry(pub String, pub u64);

#[cfg(test)]
impl LeaderboardEntry {
    pub fn user(&self) -> &str {
        &self.0
    }

    pub fn count(&self) -> u64 {
        self.1
    }
}

/// Returns the `n` highest counts, descending, ties ordered by user ascending.
pub fn top(counts: &MentionCounts, n: usize) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<(&String, &u64)> = counts.iter().collect();

    // `counts` iterates in key order, so a stable sort keeps ties alphabetical
    entries.sort_by_key(|(_, count)| Reverse(**count));

    entries
        .into_iter()
        .take(n)
        .map(|(user, count)| LeaderboardEntry(user.clone(), *count))
        .collect()
}

/// Serializes a projection into the JSON payload pushed to live-feed viewers
pub fn frame(entries: &[LeaderboardEntry]) -> String {
    serde_json::to_string(entries).unwrap_or_else(|e| {
        tracing::error!(error = ?e, "failed to serialize leaderboard frame");
        String::from("[]")
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constants::LEADERBOARD_SIZE;

    fn counts(pairs: &[(&str, u64)]) -> MentionCounts {
        pairs.iter().map(|(u, c)| (u.to_string(), *c)).collect()
    }

    #[test]
    fn test_alice_and_bob() {
        let board = top(&counts(&[("bob", 1), ("alice", 3)]), LEADERBOARD_SIZE);

        assert_eq!(
            board,
            vec![
                LeaderboardEntry("alice".into(), 3),
                LeaderboardEntry("bob".into(), 1)
            ]
        );
        assert_eq!(frame(&board), r#"[["alice",3],["bob",1]]"#);
    }

    #[test]
    fn test_twelve_users_keeps_highest_ten() {
        let map: MentionCounts = (1..=12u64).map(|i| (format!("user{i:02}"), i)).collect();
        let board = top(&map, LEADERBOARD_SIZE);

        assert_eq!(board.len(), 10);
        assert_eq!(board[0], LeaderboardEntry("user12".into(), 12));
        assert_eq!(board[9], LeaderboardEntry("user03".into(), 3));
        assert!(!board.iter().any(|e| e.user() == "user01" || e.user() == "user02"));
    }

    #[test]
    fn test_sorted_and_bounded() {
        let map = counts(&[("a", 4), ("b", 9), ("c", 1), ("d", 9), ("e", 2)]);
        let board = top(&map, LEADERBOARD_SIZE);

        assert_eq!(board.len(), 5);
        assert!(board.windows(2).all(|w| w[0].count() >= w[1].count()));
    }

    #[test]
    fn test_ties_break_by_user() {
        let board = top(&counts(&[("zed", 2), ("amy", 2), ("kim", 2)]), 2);

        let users: Vec<&str> = board.iter().map(|e| e.user()).collect();
        assert_eq!(users, ["amy", "kim"]);
    }

    #[test]
    fn test_empty_board() {
        let board = top(&MentionCounts::new(), LEADERBOARD_SIZE);

        assert!(board.is_empty());
        assert_eq!(frame(&board), "[]");
    }
}

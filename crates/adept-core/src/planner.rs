//! Assignment planner: picks the followers to bind to one mission.
//!
//! Planning is a pure function of the mission, the candidate followers and
//! the wallet. It never touches the network; a withheld decision is the
//! planner-side transient rejection of the outcome taxonomy.
//!
//! # Selection
//!
//! 1. Withhold when fewer idle followers exist than the mission's capacity.
//! 2. Withhold when the wallet cannot cover the mission's currency cost.
//! 3. Case missions bind the strongest idle followers regardless of
//!    profession.
//! 4. Other missions take idle followers with a preferred profession first,
//!    in encounter order (strongest first only when there are more of them
//!    than slots), then top up from the remaining idle followers by
//!    efficiency.
//!
//! Efficiency ties keep encounter order.

use adept_types::{CurrencyShortfall, Follower, FollowerId, Mission, MissionCategory, ResourceWallet};

/// Why a mission was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithholdReason {
    /// The mission asks for zero followers.
    NoCapacity,
    /// Not enough idle followers.
    InsufficientFollowers {
        /// Followers the mission needs.
        required: u32,
        /// Idle followers available.
        idle: usize,
    },
    /// The wallet cannot pay the mission's price.
    InsufficientResources(CurrencyShortfall),
}

impl core::fmt::Display for WithholdReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoCapacity => f.write_str("mission has no capacity"),
            Self::InsufficientFollowers { required, idle } => write!(
                f,
                "insufficient followers (need {required}, {idle} idle)"
            ),
            Self::InsufficientResources(shortfall) => write!(
                f,
                "insufficient resources (currency {}: need {}, have {})",
                shortfall.currency, shortfall.required, shortfall.available
            ),
        }
    }
}

/// The planner's verdict for one mission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Start the mission with exactly these followers.
    Proceed(Vec<FollowerId>),
    /// Skip the mission for this pass.
    Withhold(WithholdReason),
}

/// Decide whether `mission` can start and with which followers.
///
/// `followers` is the candidate pool in encounter order; busy followers in
/// it are ignored. A [`Decision::Proceed`] always carries exactly
/// `mission.capacity` distinct follower ids.
pub fn plan_assignment<'a, I>(mission: &Mission, followers: I, wallet: &ResourceWallet) -> Decision
where
    I: IntoIterator<Item = &'a Follower>,
{
    let capacity = usize::try_from(mission.capacity).unwrap_or(usize::MAX);
    if capacity == 0 {
        return Decision::Withhold(WithholdReason::NoCapacity);
    }

    let idle: Vec<&Follower> = followers.into_iter().filter(|f| f.is_idle()).collect();
    if idle.len() < capacity {
        return Decision::Withhold(WithholdReason::InsufficientFollowers {
            required: mission.capacity,
            idle: idle.len(),
        });
    }

    if let Some(shortfall) = wallet.shortfall(&mission.cost) {
        return Decision::Withhold(WithholdReason::InsufficientResources(shortfall));
    }

    let selected = if mission.category == MissionCategory::Case {
        strongest(idle, capacity)
    } else {
        profession_first(mission, idle, capacity)
    };
    Decision::Proceed(selected)
}

/// Sort idle followers by efficiency ascending and keep the top `capacity`.
fn strongest(mut idle: Vec<&Follower>, capacity: usize) -> Vec<FollowerId> {
    idle.sort_by(|a, b| a.efficiency.total_cmp(&b.efficiency));
    let skip = idle.len().saturating_sub(capacity);
    idle.into_iter().skip(skip).map(|f| f.id).collect()
}

/// Preferred professions first, then the best of the rest.
fn profession_first(mission: &Mission, idle: Vec<&Follower>, capacity: usize) -> Vec<FollowerId> {
    let (mut matched, mut rest): (Vec<&Follower>, Vec<&Follower>) =
        idle.into_iter().partition(|f| mission.prefers(f.profession));

    if matched.len() > capacity {
        matched.sort_by(|a, b| b.efficiency.total_cmp(&a.efficiency));
        matched.truncate(capacity);
    }

    let missing = capacity.saturating_sub(matched.len());
    rest.sort_by(|a, b| b.efficiency.total_cmp(&a.efficiency));

    matched
        .into_iter()
        .chain(rest.into_iter().take(missing))
        .map(|f| f.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use adept_types::{CurrencyAmount, CurrencyId, MissionCost, MissionId, ProfessionId};

    use super::*;

    fn follower(id: u64, efficiency: f64, profession: u64, in_progress: bool) -> Follower {
        Follower {
            id: FollowerId::new(id),
            efficiency,
            profession: ProfessionId::new(profession),
            in_progress,
        }
    }

    fn mission(capacity: u32, professions: &[u64], category: MissionCategory) -> Mission {
        Mission {
            id: MissionId::new(1),
            name: String::from("Test"),
            capacity,
            duration: 600,
            required_professions: professions.iter().copied().map(ProfessionId::new).collect(),
            cost: MissionCost::default(),
            category,
            in_progress: false,
            success: None,
            difficulty: None,
            experience: None,
        }
    }

    fn ids(raw: &[u64]) -> Vec<FollowerId> {
        raw.iter().copied().map(FollowerId::new).collect()
    }

    #[test]
    fn insufficient_followers_counts_only_idle() {
        let followers = vec![follower(1, 1.0, 1, false), follower(2, 5.0, 1, true)];
        let decision = plan_assignment(
            &mission(2, &[], MissionCategory::Mining),
            &followers,
            &ResourceWallet::default(),
        );
        assert_eq!(
            decision,
            Decision::Withhold(WithholdReason::InsufficientFollowers { required: 2, idle: 1 })
        );
        assert!(decision_text(&decision).starts_with("insufficient followers"));
    }

    #[test]
    fn insufficient_resources_is_withheld() {
        let mut m = mission(1, &[], MissionCategory::Invasion);
        m.cost.currencies.push(CurrencyAmount {
            id: CurrencyId::new(1),
            amount: 100,
        });
        let wallet: ResourceWallet = [(CurrencyId::new(1), 50)].into_iter().collect();
        let decision = plan_assignment(&m, &[follower(1, 1.0, 1, false)], &wallet);
        assert!(matches!(
            decision,
            Decision::Withhold(WithholdReason::InsufficientResources(_))
        ));
        assert!(decision_text(&decision).starts_with("insufficient resources"));
    }

    #[test]
    fn follower_shortage_is_checked_before_cost() {
        let mut m = mission(2, &[], MissionCategory::Invasion);
        m.cost.currencies.push(CurrencyAmount {
            id: CurrencyId::new(1),
            amount: 100,
        });
        let decision = plan_assignment(&m, &[follower(1, 1.0, 1, false)], &ResourceWallet::default());
        assert!(matches!(
            decision,
            Decision::Withhold(WithholdReason::InsufficientFollowers { .. })
        ));
    }

    #[test]
    fn zero_capacity_is_withheld() {
        let decision = plan_assignment(
            &mission(0, &[], MissionCategory::Mining),
            &[follower(1, 1.0, 1, false)],
            &ResourceWallet::default(),
        );
        assert_eq!(decision, Decision::Withhold(WithholdReason::NoCapacity));
    }

    #[test]
    fn off_profession_top_up_takes_the_strongest_remaining() {
        // Two of three required-profession followers idle; the third
        // candidate must be the strongest off-profession follower.
        let followers = vec![
            follower(1, 2.0, 7, false),
            follower(2, 1.0, 8, false),
            follower(3, 3.0, 7, false),
            follower(4, 9.0, 8, false),
            follower(5, 10.0, 7, true),
        ];
        let decision = plan_assignment(
            &mission(3, &[7], MissionCategory::Mining),
            &followers,
            &ResourceWallet::default(),
        );
        // Matched followers fit the slots, so they keep encounter order.
        assert_eq!(decision, Decision::Proceed(ids(&[1, 3, 4])));
    }

    #[test]
    fn empty_profession_list_selects_by_efficiency() {
        let followers = vec![
            follower(1, 2.0, 1, false),
            follower(2, 4.0, 2, false),
            follower(3, 3.0, 3, false),
        ];
        let decision = plan_assignment(
            &mission(2, &[], MissionCategory::Mining),
            &followers,
            &ResourceWallet::default(),
        );
        assert_eq!(decision, Decision::Proceed(ids(&[2, 3])));
    }

    #[test]
    fn matched_pool_that_fits_keeps_encounter_order() {
        let followers = vec![
            follower(1, 1.0, 7, false),
            follower(2, 5.0, 7, false),
            follower(3, 9.0, 8, false),
        ];
        let decision = plan_assignment(
            &mission(2, &[7], MissionCategory::Mining),
            &followers,
            &ResourceWallet::default(),
        );
        assert_eq!(decision, Decision::Proceed(ids(&[1, 2])));
    }

    #[test]
    fn oversized_matched_pool_is_truncated_to_capacity() {
        let followers = vec![
            follower(1, 1.0, 7, false),
            follower(2, 5.0, 7, false),
            follower(3, 3.0, 7, false),
        ];
        let decision = plan_assignment(
            &mission(2, &[7], MissionCategory::Mining),
            &followers,
            &ResourceWallet::default(),
        );
        assert_eq!(decision, Decision::Proceed(ids(&[2, 3])));
    }

    #[test]
    fn efficiency_ties_keep_encounter_order() {
        let followers = vec![
            follower(1, 2.0, 1, false),
            follower(2, 2.0, 1, false),
            follower(3, 2.0, 1, false),
        ];
        let decision = plan_assignment(
            &mission(2, &[], MissionCategory::Mining),
            &followers,
            &ResourceWallet::default(),
        );
        assert_eq!(decision, Decision::Proceed(ids(&[1, 2])));
    }

    #[test]
    fn case_missions_reserve_the_strongest_ignoring_profession() {
        let followers = vec![
            follower(1, 5.0, 7, false),
            follower(2, 1.0, 7, false),
            follower(3, 8.0, 9, false),
            follower(4, 3.0, 9, false),
        ];
        let decision = plan_assignment(
            &mission(2, &[7], MissionCategory::Case),
            &followers,
            &ResourceWallet::default(),
        );
        assert_eq!(decision, Decision::Proceed(ids(&[1, 3])));
    }

    #[test]
    fn proceed_sets_are_exact_and_unique() {
        let followers: Vec<Follower> = (1..=12)
            .map(|i| follower(i, f64::from(u32::try_from(i % 5).unwrap_or(0)), i % 3, i % 4 == 0))
            .collect();
        for capacity in 1..=9 {
            for category in [MissionCategory::Mining, MissionCategory::Case] {
                for professions in [&[][..], &[0][..], &[1, 2][..]] {
                    let m = mission(capacity, professions, category);
                    if let Decision::Proceed(set) =
                        plan_assignment(&m, &followers, &ResourceWallet::default())
                    {
                        let unique: BTreeSet<FollowerId> = set.iter().copied().collect();
                        assert_eq!(set.len(), usize::try_from(capacity).unwrap_or(0));
                        assert_eq!(unique.len(), set.len());
                    }
                }
            }
        }
    }

    fn decision_text(decision: &Decision) -> String {
        match decision {
            Decision::Withhold(reason) => reason.to_string(),
            Decision::Proceed(_) => String::new(),
        }
    }
}

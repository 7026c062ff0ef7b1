//! Trending ranking: weighted engagement with logarithmic time decay.
//!
//! ```text
//! engagement = (likes + 1) * 0.7 + (comments + 1) * 0.3
//! score      = engagement / ln(hours + 1) * 3
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::post::{EngagementCounts, PostAggregate};

pub const LIKES_WEIGHT: f64 = 0.7;
pub const COMMENTS_WEIGHT: f64 = 0.3;
pub const TIME_FACTOR: f64 = 3.0;

/// Elapsed time is floored at one second so `ln(hours + 1)` never reaches zero.
pub const MIN_ELAPSED_HOURS: f64 = 1.0 / 3600.0;

/// Post with its computed trending score. Only lives for one ranking request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoredPost {
	#[serde(flatten)]
	pub post: PostAggregate,
	pub score: f64,
}

pub fn engagement_score(counts: &EngagementCounts) -> f64 {
	let total_likes = counts.likes_count as f64 + 1.0;
	let total_comments = counts.comments_count as f64 + 1.0;
	total_likes * LIKES_WEIGHT + total_comments * COMMENTS_WEIGHT
}

pub fn apply_time_decay(
	engagement: f64,
	hours_since_post: f64,
) -> f64 {
	let hours = hours_since_post.max(MIN_ELAPSED_HOURS);
	engagement / (hours + 1.0).ln() * TIME_FACTOR
}

/// Fractional hours between `created` and `now`.
pub fn hours_between(
	created: DateTime<Utc>,
	now: DateTime<Utc>,
) -> f64 {
	(now - created).num_milliseconds() as f64 / (1000.0 * 3600.0)
}

pub fn trending_score(
	counts: &EngagementCounts,
	created: DateTime<Utc>,
	now: DateTime<Utc>,
) -> f64 {
	apply_time_decay(engagement_score(counts), hours_between(created, now))
}

/// Sorts by descending score. The sort is stable, so equal scores keep their input order.
pub fn sort_by_score(posts: &mut [ScoredPost]) {
	posts.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Scores every post against `now` and returns them ranked.
pub fn rank(
	posts: Vec<PostAggregate>,
	now: DateTime<Utc>,
) -> Vec<ScoredPost> {
	let mut scored: Vec<ScoredPost> = posts
		.into_iter()
		.map(|post| {
			let score = trending_score(&post.counts(), post.create_dt, now);
			ScoredPost { post, score }
		})
		.collect();
	sort_by_score(&mut scored);
	scored
}

#[cfg(test)]
mod test {
	use chrono::{Duration, Utc};
	use rand::Rng;
	use uuid::Uuid;

	use super::*;
	use crate::domain::{post::entity::Post, user::UserSummary};

	fn counts(
		likes: u64,
		comments: u64,
	) -> EngagementCounts {
		EngagementCounts {
			likes_count: likes,
			comments_count: comments,
			saves_count: 0,
		}
	}

	fn aggregate(
		likes: u64,
		comments: u64,
		created: DateTime<Utc>,
	) -> PostAggregate {
		let owner = Uuid::new_v4();
		PostAggregate::new(
			Post {
				id: Uuid::new_v4(),
				user_id: owner,
				content: Some("post".into()),
				image_url: None,
				image_id: None,
				create_dt: created,
				update_dt: created,
			},
			UserSummary {
				id: owner,
				username: "migo".into(),
				email: "migo@krust.dev".into(),
				full_name: None,
				avatar: None,
				banner: None,
				create_dt: created,
				update_dt: created,
			},
			counts(likes, comments),
		)
	}

	#[test]
	fn test_zero_engagement_is_one() {
		assert!((engagement_score(&counts(0, 0)) - 1.0).abs() < 1e-12);
	}

	#[test]
	fn test_known_scores() {
		'_given: {
			let now = Utc::now();
			let a = aggregate(9, 4, now - Duration::hours(2));
			let b = aggregate(0, 0, now - Duration::hours(1));

			'_when: {
				let engagement_a = engagement_score(&a.counts());
				assert!((engagement_a - 8.5).abs() < 1e-9);
				assert!((engagement_a / 3f64.ln() - 7.737).abs() < 1e-3);

				let score_a = trending_score(&a.counts(), a.create_dt, now);
				let score_b = trending_score(&b.counts(), b.create_dt, now);
				assert!((score_a - 23.21).abs() < 1e-2);
				assert!((score_b - 4.328).abs() < 1e-3);

				let ranked = rank(vec![b.clone(), a.clone()], now);
				assert_eq!(ranked[0].post.id, a.id);
				assert_eq!(ranked[1].post.id, b.id);
			}
		}
	}

	#[test]
	fn test_decay_strictly_decreasing_in_hours() {
		let engagement = engagement_score(&counts(5, 2));
		let mut previous = f64::INFINITY;
		for hours in [0.01, 0.5, 1.0, 2.0, 12.0, 24.0, 24.0 * 7.0, 24.0 * 365.0] {
			let score = apply_time_decay(engagement, hours);
			assert!(score < previous, "score at {hours}h did not decay");
			previous = score;
		}
	}

	#[test]
	fn test_score_increasing_in_engagement() {
		let now = Utc::now();
		let created = now - Duration::hours(5);
		let base = trending_score(&counts(3, 3), created, now);
		assert!(trending_score(&counts(4, 3), created, now) > base);
		assert!(trending_score(&counts(3, 4), created, now) > base);
		// likes outweigh comments
		assert!(trending_score(&counts(4, 3), created, now) > trending_score(&counts(3, 4), created, now));
	}

	#[test]
	fn test_zero_elapsed_uses_one_second_floor() {
		let now = Utc::now();
		let at_zero = trending_score(&counts(0, 0), now, now);
		let at_one_second = trending_score(&counts(0, 0), now - Duration::seconds(1), now);

		assert!(at_zero.is_finite());
		assert!(at_zero > 0.0);
		assert!((at_zero - at_one_second).abs() < 1e-6);

		// clock skew: a post "from the future" is treated as brand new
		let future = trending_score(&counts(0, 0), now + Duration::minutes(5), now);
		assert!((future - at_zero).abs() < 1e-6);
	}

	#[test]
	fn test_sorted_output_non_increasing() {
		let now = Utc::now();
		let mut rng = rand::thread_rng();
		let posts: Vec<PostAggregate> = (0..50)
			.map(|_| {
				aggregate(
					rng.gen_range(0..100),
					rng.gen_range(0..100),
					now - Duration::minutes(rng.gen_range(0..60 * 24 * 30)),
				)
			})
			.collect();

		let ranked = rank(posts, now);
		assert_eq!(ranked.len(), 50);
		for pair in ranked.windows(2) {
			assert!(pair[0].score >= pair[1].score);
		}
	}

	#[test]
	fn test_ties_keep_input_order() {
		let now = Utc::now();
		let created = now - Duration::hours(3);
		let first = aggregate(2, 2, created);
		let second = aggregate(2, 2, created);
		let third = aggregate(2, 2, created);
		let leader = aggregate(50, 0, created);

		let ranked = rank(vec![first.clone(), second.clone(), leader.clone(), third.clone()], now);
		let ids: Vec<Uuid> = ranked.iter().map(|p| p.post.id).collect();
		assert_eq!(ids, vec![leader.id, first.id, second.id, third.id]);
	}

	#[test]
	fn test_scored_post_serializes_score() {
		let now = Utc::now();
		let ranked = rank(vec![aggregate(1, 1, now - Duration::hours(1))], now);
		let value = serde_json::to_value(&ranked[0]).unwrap();
		assert!(value["score"].as_f64().unwrap() > 0.0);
		assert_eq!(value["likesCount"], 1);
		assert_eq!(value["user"]["username"], "migo");
	}
}

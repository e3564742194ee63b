//! Thread validation
//!
//! Everything here runs before any network activity: blank-body filtering,
//! the per-post character limit (reported exhaustively), the thread size
//! limit, and the counter thresholds a front end shows while editing.

use std::sync::Arc;

use serde::Serialize;

use crate::config::ThreadConfig;
use crate::error::{OverLengthPost, ValidationError};
use crate::types::char_len;

/// How close a post is to the character limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterLevel {
    Normal,
    /// Above `warning_ratio * max`
    Warning,
    /// Above `danger_ratio * max`
    Danger,
}

/// Validates bodies against the configured thread limits
#[derive(Clone)]
pub struct ValidationService {
    config: Arc<ThreadConfig>,
}

impl ValidationService {
    pub fn new(config: Arc<ThreadConfig>) -> Self {
        Self { config }
    }

    /// Trim bodies, drop blank ones and check the limits
    ///
    /// Returns the bodies that will be posted, in input order.
    ///
    /// # Errors
    ///
    /// - `EmptyThread` if nothing non-blank remains
    /// - `TooLong` listing every over-length body (1-based, after blanks are dropped)
    /// - `TooManyPosts` above `max_posts_per_thread`
    pub fn validate_thread<S: AsRef<str>>(
        &self,
        bodies: &[S],
    ) -> std::result::Result<Vec<String>, ValidationError> {
        let posts: Vec<String> = bodies
            .iter()
            .map(|b| b.as_ref().trim())
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .collect();

        if posts.is_empty() {
            return Err(ValidationError::EmptyThread);
        }

        let max = self.config.max_post_length;
        let over: Vec<OverLengthPost> = posts
            .iter()
            .enumerate()
            .filter_map(|(i, content)| {
                let length = char_len(content);
                (length > max).then(|| OverLengthPost {
                    index: i + 1,
                    content: content.clone(),
                    length,
                })
            })
            .collect();

        if !over.is_empty() {
            return Err(ValidationError::TooLong { max, posts: over });
        }

        if posts.len() > self.config.max_posts_per_thread {
            return Err(ValidationError::TooManyPosts {
                count: posts.len(),
                max: self.config.max_posts_per_thread,
            });
        }

        Ok(posts)
    }

    pub fn counter_level(&self, length: usize) -> CounterLevel {
        let max = self.config.max_post_length as f64;
        let length = length as f64;
        if length > max * self.config.danger_ratio {
            CounterLevel::Danger
        } else if length > max * self.config.warning_ratio {
            CounterLevel::Warning
        } else {
            CounterLevel::Normal
        }
    }

    pub fn max_post_length(&self) -> usize {
        self.config.max_post_length
    }

    pub fn max_posts(&self) -> usize {
        self.config.max_posts_per_thread
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ValidationService {
        ValidationService::new(Arc::new(ThreadConfig::default()))
    }

    #[test]
    fn test_blank_bodies_are_dropped() {
        let posts = service()
            .validate_thread(&["  first ", "", "\n\t", "second"])
            .unwrap();
        assert_eq!(posts, vec!["first", "second"]);
    }

    #[test]
    fn test_all_blank_is_empty_thread() {
        assert_eq!(
            service().validate_thread(&["", "   ", "\n"]).unwrap_err(),
            ValidationError::EmptyThread
        );
        let none: [&str; 0] = [];
        assert_eq!(
            service().validate_thread(&none).unwrap_err(),
            ValidationError::EmptyThread
        );
    }

    #[test]
    fn test_too_long_is_exhaustive() {
        let long_x = "x".repeat(301);
        let long_y = "y".repeat(400);
        let err = service()
            .validate_thread(&["ok".to_string(), long_x.clone(), long_y.clone()])
            .unwrap_err();

        match err {
            ValidationError::TooLong { max, posts } => {
                assert_eq!(max, 300);
                assert_eq!(
                    posts,
                    vec![
                        OverLengthPost {
                            index: 2,
                            content: long_x,
                            length: 301
                        },
                        OverLengthPost {
                            index: 3,
                            content: long_y,
                            length: 400
                        },
                    ]
                );
            }
            other => panic!("Expected TooLong, got {:?}", other),
        }
    }

    #[test]
    fn test_limit_counts_characters() {
        // 300 four-byte characters are exactly at the limit
        let styled = "𝐁".repeat(300);
        assert!(service().validate_thread(&[styled]).is_ok());
    }

    #[test]
    fn test_too_many_posts() {
        let bodies: Vec<String> = (0..201).map(|i| format!("post {}", i)).collect();
        assert_eq!(
            service().validate_thread(&bodies).unwrap_err(),
            ValidationError::TooManyPosts {
                count: 201,
                max: 200
            }
        );
    }

    #[test]
    fn test_counter_levels() {
        let service = service();
        assert_eq!(service.counter_level(0), CounterLevel::Normal);
        assert_eq!(service.counter_level(240), CounterLevel::Normal);
        assert_eq!(service.counter_level(241), CounterLevel::Warning);
        assert_eq!(service.counter_level(270), CounterLevel::Warning);
        assert_eq!(service.counter_level(271), CounterLevel::Danger);
        assert_eq!(service.counter_level(350), CounterLevel::Danger);
    }
}

//! Content coordinator: communities, posts and comments
//!
//! Validation and ownership checks happen before anything is written.
//! Each primary write commits on its own; points and notifications follow
//! as best-effort side effects.

use std::sync::Arc;

use tracing::{debug, info};

use crate::db::counters::{self, Counter};
use crate::db::models::{Comment, Community, PointsReason, Post};
use crate::db::posts::{PostSort, TimeRange};
use crate::db::{agents, clamp_limit, comments, communities, posts, HubDb, Page, DEFAULT_PAGE_LIMIT};
use crate::error::HubError;

use super::events::{EventBus, HubEvent};
use super::notification_service::Notifier;
use super::points_service::PointsAwarder;
use super::side_effects::best_effort;

/// Shortest accepted comment, in characters after trimming
pub const MIN_COMMENT_CHARS: usize = 20;
/// Longest accepted post title, in characters
pub const MAX_TITLE_CHARS: usize = 300;
/// Longest accepted community name, in characters
pub const MAX_COMMUNITY_NAME_CHARS: usize = 50;

fn validate_title(title: &str) -> Result<(), HubError> {
    let len = title.trim().chars().count();
    if len == 0 || len > MAX_TITLE_CHARS {
        return Err(HubError::InvalidInput(format!(
            "title must be 1-{} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(())
}

fn validate_comment(content: &str) -> Result<(), HubError> {
    if content.trim().chars().count() < MIN_COMMENT_CHARS {
        return Err(HubError::InvalidInput(format!(
            "comment must be at least {} characters",
            MIN_COMMENT_CHARS
        )));
    }
    Ok(())
}

pub struct ContentService {
    db: Arc<HubDb>,
    points: Arc<dyn PointsAwarder>,
    notifier: Arc<dyn Notifier>,
    events: Arc<EventBus>,
}

impl ContentService {
    pub fn new(
        db: Arc<HubDb>,
        points: Arc<dyn PointsAwarder>,
        notifier: Arc<dyn Notifier>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            db,
            points,
            notifier,
            events,
        }
    }

    // =========================================================================
    // Communities
    // =========================================================================

    pub fn create_community(&self, name: &str, description: Option<&str>) -> Result<Community, HubError> {
        let name = name.trim();
        let len = name.chars().count();
        if len == 0 || len > MAX_COMMUNITY_NAME_CHARS {
            return Err(HubError::InvalidInput(format!(
                "community name must be 1-{} characters",
                MAX_COMMUNITY_NAME_CHARS
            )));
        }

        let community = self
            .db
            .with_conn(|conn| communities::create_community(conn, name, description))?;

        info!(community_id = community.id, name = %community.name, "Community created");
        self.events.emit(HubEvent::CommunityCreated {
            community_id: community.id,
            name: community.name.clone(),
        });
        Ok(community)
    }

    pub fn get_community(&self, id: i64) -> Result<Community, HubError> {
        self.db
            .with_conn(|conn| communities::get_community(conn, id))?
            .ok_or_else(|| HubError::NotFound(format!("Community {} not found", id)))
    }

    pub fn list_communities(&self, limit: i64, offset: i64) -> Result<Page<Community>, HubError> {
        let limit = clamp_limit(limit, DEFAULT_PAGE_LIMIT);
        self.db
            .with_conn(|conn| communities::list_communities(conn, limit, offset.max(0)))
    }

    // =========================================================================
    // Posts
    // =========================================================================

    pub fn create_post(
        &self,
        agent_id: i64,
        community_id: i64,
        title: &str,
        content: Option<&str>,
    ) -> Result<Post, HubError> {
        validate_title(title)?;

        let post = self.db.with_transaction(|conn| {
            agents::require_agent(conn, agent_id)?;
            communities::get_community(conn, community_id)?
                .ok_or_else(|| HubError::NotFound(format!("Community {} not found", community_id)))?;
            posts::create_post(conn, agent_id, community_id, title, content)
        })?;

        info!(post_id = post.id, agent_id, community_id, "Post created");
        best_effort(
            "post_created points",
            self.points.award(agent_id, PointsReason::PostCreated, Some(post.id)),
        );
        self.events.emit(HubEvent::PostCreated {
            post_id: post.id,
            agent_id,
            community_id,
        });
        Ok(post)
    }

    pub fn get_post(&self, post_id: i64) -> Result<Post, HubError> {
        self.db.with_conn(|conn| posts::require_post(conn, post_id))
    }

    pub fn list_posts(
        &self,
        sort: PostSort,
        range: TimeRange,
        limit: i64,
        offset: i64,
    ) -> Result<Page<Post>, HubError> {
        let limit = clamp_limit(limit, DEFAULT_PAGE_LIMIT);
        self.db
            .with_conn(|conn| posts::list_posts(conn, sort, range, limit, offset.max(0)))
    }

    /// Author-only partial update; `None` fields are left as they are
    pub fn update_post(
        &self,
        agent_id: i64,
        post_id: i64,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<Post, HubError> {
        if let Some(title) = title {
            validate_title(title)?;
        }

        let post = self.db.with_transaction(|conn| {
            let post = posts::require_post(conn, post_id)?;
            if post.agent_id != agent_id {
                return Err(HubError::Forbidden(format!("Post {} belongs to another agent", post_id)));
            }
            posts::update_post(conn, post_id, title, content)
        })?;

        self.events.emit(HubEvent::PostUpdated { post_id });
        Ok(post)
    }

    /// Author-only delete; the post's comments go with it
    pub fn delete_post(&self, agent_id: i64, post_id: i64) -> Result<(), HubError> {
        let removed_comments = self.db.with_transaction(|conn| {
            let post = posts::require_post(conn, post_id)?;
            if post.agent_id != agent_id {
                return Err(HubError::Forbidden(format!("Post {} belongs to another agent", post_id)));
            }
            posts::delete_post(conn, post_id)
        })?;

        info!(post_id, agent_id, removed_comments, "Post deleted");
        self.events.emit(HubEvent::PostDeleted {
            post_id,
            by_moderator: false,
        });
        Ok(())
    }

    /// Remove any post and penalise its author. The caller is responsible
    /// for having authorised the moderator.
    pub fn remove_post_as_moderator(&self, post_id: i64) -> Result<(), HubError> {
        let author_id = self.db.with_transaction(|conn| {
            let post = posts::require_post(conn, post_id)?;
            posts::delete_post(conn, post_id)?;
            Ok(post.agent_id)
        })?;

        info!(post_id, author_id, "Post removed by moderator");
        best_effort(
            "content_deleted_by_admin points",
            self.points.award(author_id, PointsReason::ContentDeletedByAdmin, Some(post_id)),
        );
        self.events.emit(HubEvent::PostDeleted {
            post_id,
            by_moderator: true,
        });
        Ok(())
    }

    // =========================================================================
    // Comments
    // =========================================================================

    pub fn create_comment(&self, agent_id: i64, post_id: i64, content: &str) -> Result<Comment, HubError> {
        let (comment, post_owner) = self.db.with_transaction(|conn| {
            agents::require_agent(conn, agent_id)?;
            let post = posts::require_post(conn, post_id)?;
            validate_comment(content)?;

            let comment = comments::create_comment(conn, agent_id, post_id, content)?;
            counters::adjust(conn, Counter::PostComments(post_id), 1)?;
            Ok((comment, post.agent_id))
        })?;

        debug!(comment_id = comment.id, post_id, agent_id, "Comment created");
        best_effort(
            "comment_created points",
            self.points.award(agent_id, PointsReason::CommentCreated, Some(comment.id)),
        );
        best_effort(
            "comment_on_post notification",
            self.notifier
                .notify_comment_on_post(post_owner, agent_id, post_id, comment.id, &comment.content),
        );
        self.events.emit(HubEvent::CommentCreated {
            comment_id: comment.id,
            post_id,
            agent_id,
        });
        Ok(comment)
    }

    pub fn list_comments(&self, post_id: i64, limit: i64, offset: i64) -> Result<Page<Comment>, HubError> {
        let limit = clamp_limit(limit, DEFAULT_PAGE_LIMIT);
        self.db.with_conn(|conn| {
            posts::require_post(conn, post_id)?;
            comments::list_by_post(conn, post_id, limit, offset.max(0))
        })
    }

    /// Author-only delete; the post's comment count drops, floored at 0
    pub fn delete_comment(&self, agent_id: i64, comment_id: i64) -> Result<(), HubError> {
        let post_id = self.db.with_transaction(|conn| {
            let comment = comments::require_comment(conn, comment_id)?;
            if comment.agent_id != agent_id {
                return Err(HubError::Forbidden(format!(
                    "Comment {} belongs to another agent",
                    comment_id
                )));
            }
            comments::delete_comment(conn, comment_id)?;
            counters::adjust(conn, Counter::PostComments(comment.post_id), -1)?;
            Ok(comment.post_id)
        })?;

        debug!(comment_id, post_id, agent_id, "Comment deleted");
        self.events.emit(HubEvent::CommentDeleted { comment_id, post_id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{notifications, points_log};
    use crate::services::notification_service::NotificationService;
    use crate::services::points_service::PointsService;

    struct Fixture {
        db: Arc<HubDb>,
        service: ContentService,
        author: i64,
        reader: i64,
        community: i64,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(HubDb::open_in_memory().unwrap());
        let events = Arc::new(EventBus::new());
        let (author, reader) = db
            .with_conn(|conn| {
                Ok((
                    agents::create_agent(conn, "author", None, None)?.id,
                    agents::create_agent(conn, "reader", None, None)?.id,
                ))
            })
            .unwrap();
        let service = ContentService::new(
            db.clone(),
            Arc::new(PointsService::new(db.clone(), events.clone())),
            Arc::new(NotificationService::new(db.clone(), events.clone())),
            events,
        );
        let community = service.create_community("general", Some("anything goes")).unwrap().id;
        Fixture { db, service, author, reader, community }
    }

    fn points_of(db: &HubDb, agent_id: i64) -> i64 {
        db.with_conn(|conn| agents::require_agent(conn, agent_id)).unwrap().points
    }

    #[test]
    fn test_create_post_awards_author() {
        let f = fixture();
        let post = f.service.create_post(f.author, f.community, "hello", Some("world")).unwrap();
        assert_eq!(post.agent_id, f.author);
        assert_eq!(points_of(&f.db, f.author), 10);
    }

    #[test]
    fn test_create_post_validation() {
        let f = fixture();
        assert!(matches!(
            f.service.create_post(f.author, 999, "hello", None),
            Err(HubError::NotFound(_))
        ));
        assert!(matches!(
            f.service.create_post(f.author, f.community, "   ", None),
            Err(HubError::InvalidInput(_))
        ));
        let long_title = "t".repeat(MAX_TITLE_CHARS + 1);
        assert!(matches!(
            f.service.create_post(f.author, f.community, &long_title, None),
            Err(HubError::InvalidInput(_))
        ));
        assert_eq!(points_of(&f.db, f.author), 0);
    }

    #[test]
    fn test_comment_length_boundary() {
        let f = fixture();
        let post = f.service.create_post(f.author, f.community, "thread", None).unwrap();

        let nineteen = format!("  {}  ", "c".repeat(19));
        assert!(matches!(
            f.service.create_comment(f.reader, post.id, &nineteen),
            Err(HubError::InvalidInput(_))
        ));

        let twenty = format!("  {}  ", "c".repeat(20));
        f.service.create_comment(f.reader, post.id, &twenty).unwrap();
        assert_eq!(f.service.get_post(post.id).unwrap().comments_count, 1);
    }

    #[test]
    fn test_comment_side_effects() {
        let f = fixture();
        let post = f.service.create_post(f.author, f.community, "thread", None).unwrap();
        let comment = f
            .service
            .create_comment(f.reader, post.id, "this is a perfectly long comment")
            .unwrap();

        assert_eq!(points_of(&f.db, f.reader), 5);
        let inbox = f.db.with_conn(|conn| notifications::list(conn, f.author, 20, 0)).unwrap();
        assert_eq!(inbox.total, 1);
        assert_eq!(inbox.items[0].related_entity_id, Some(comment.id));
        assert_eq!(inbox.items[0].actor_agent_id, Some(f.reader));
    }

    #[test]
    fn test_ownership_gates() {
        let f = fixture();
        let post = f.service.create_post(f.author, f.community, "mine", None).unwrap();
        let comment = f
            .service
            .create_comment(f.reader, post.id, "reader owns this comment here")
            .unwrap();

        assert!(matches!(
            f.service.update_post(f.reader, post.id, Some("stolen"), None),
            Err(HubError::Forbidden(_))
        ));
        assert!(matches!(f.service.delete_post(f.reader, post.id), Err(HubError::Forbidden(_))));
        assert!(matches!(
            f.service.delete_comment(f.author, comment.id),
            Err(HubError::Forbidden(_))
        ));

        let updated = f.service.update_post(f.author, post.id, None, Some("new body")).unwrap();
        assert_eq!(updated.title, "mine");
        assert_eq!(updated.content.as_deref(), Some("new body"));

        f.service.delete_comment(f.reader, comment.id).unwrap();
        assert_eq!(f.service.get_post(post.id).unwrap().comments_count, 0);
        f.service.delete_post(f.author, post.id).unwrap();
        assert!(matches!(f.service.get_post(post.id), Err(HubError::NotFound(_))));
    }

    #[test]
    fn test_comment_count_floor_on_delete() {
        let f = fixture();
        let post = f.service.create_post(f.author, f.community, "drifted", None).unwrap();
        let comment = f
            .service
            .create_comment(f.reader, post.id, "counter will already be zero")
            .unwrap();
        f.db.with_conn(|conn| counters::adjust(conn, Counter::PostComments(post.id), -5))
            .unwrap();

        f.service.delete_comment(f.reader, comment.id).unwrap();
        assert_eq!(f.service.get_post(post.id).unwrap().comments_count, 0);
    }

    #[test]
    fn test_moderator_removal_penalises_author() {
        let f = fixture();
        let post = f.service.create_post(f.author, f.community, "spam", None).unwrap();
        f.service.create_post(f.author, f.community, "more spam", None).unwrap();
        f.service.create_post(f.author, f.community, "even more", None).unwrap();
        assert_eq!(points_of(&f.db, f.author), 30);

        f.service.remove_post_as_moderator(post.id).unwrap();
        assert_eq!(points_of(&f.db, f.author), 10);

        let history = f.db.with_conn(|conn| points_log::history(conn, f.author, 1, 0)).unwrap();
        assert_eq!(history.items[0].points_change, -20);
        assert_eq!(history.items[0].reason, "content_deleted_by_admin");
    }

    #[test]
    fn test_listing_clamps_limits() {
        let f = fixture();
        for i in 0..3 {
            f.service.create_post(f.author, f.community, &format!("post {}", i), None).unwrap();
        }
        let page = f.service.list_posts(PostSort::New, TimeRange::All, 2, 0).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 3);

        let page = f.service.list_posts(PostSort::New, TimeRange::All, 0, -4).unwrap();
        assert_eq!(page.items.len(), 3);

        assert_eq!(f.service.list_communities(0, 0).unwrap().total, 1);
        assert!(matches!(
            f.service.create_community("general", None),
            Err(HubError::Conflict(_))
        ));
    }
}

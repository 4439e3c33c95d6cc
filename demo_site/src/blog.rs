//! Post storage and the public blog controller.

use async_trait::async_trait;
use folio_mvc::error::ServiceError;
use folio_mvc::plugins::Params;
use folio_mvc::{ActionContext, ActionError, ActionResult, Controller, Services, ViewModel};
use serde::Serialize;
use std::sync::{Arc, RwLock};

pub const REPOSITORY: &str = "BlogRepository";

#[derive(Clone, Debug, Serialize)]
pub struct Post {
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub body: String,
}

/// In-memory post list, newest first.
pub struct BlogRepository {
    posts: RwLock<Vec<Post>>,
}

impl Default for BlogRepository {
    fn default() -> Self {
        let post = |slug: &str, title: &str, body: &str| Post {
            slug: slug.into(),
            title: title.into(),
            summary: body.chars().take(60).collect(),
            body: body.into(),
        };
        BlogRepository {
            posts: RwLock::new(vec![
                post("routing", "Named routes", "Every page in this site is addressed by a route name."),
                post("sessions", "Sessions", "Flash messages survive exactly one redirect."),
                post("hello", "Hello, world", "The first post on a freshly installed site."),
            ]),
        }
    }
}

impl BlogRepository {
    pub fn page(&self, page: usize, size: usize) -> (Vec<Post>, bool) {
        let posts = self.posts.read().unwrap_or_else(|e| e.into_inner());
        let start = page.saturating_sub(1) * size;
        let slice: Vec<Post> = posts.iter().skip(start).take(size).cloned().collect();
        (slice, start + size < posts.len())
    }

    pub fn find(&self, slug: &str) -> Option<Post> {
        let posts = self.posts.read().unwrap_or_else(|e| e.into_inner());
        posts.iter().find(|p| p.slug == slug).cloned()
    }

    pub fn len(&self) -> usize {
        self.posts.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

pub struct IndexController {
    posts: Arc<BlogRepository>,
    page_size: usize,
}

impl IndexController {
    pub fn build(services: &Services) -> Result<Self, ServiceError> {
        let page_size = services.config().settings["page_size"].as_u64().unwrap_or(5) as usize;
        Ok(IndexController {
            posts: services.get_as::<BlogRepository>(REPOSITORY)?,
            page_size: page_size.max(1),
        })
    }
}

#[async_trait]
impl Controller for IndexController {
    fn has_action(&self, action: &str) -> bool {
        matches!(action, "index" | "view")
    }

    async fn dispatch_action(&mut self, action: &str, ctx: &ActionContext) -> Result<ActionResult, ActionError> {
        let params = ctx
            .plugin::<Params>("params")
            .ok_or_else(|| ActionError::msg("params plugin missing"))?;
        if action == "view" {
            let slug = params.from_route("slug").unwrap_or_default();
            return match self.posts.find(&slug) {
                Some(post) => Ok(ViewModel::new().with_serialized("post", &post).into()),
                None => {
                    ctx.mark_not_found();
                    Ok(ViewModel::new().with("path", ctx.request().path()).into())
                }
            };
        }
        let page = params.from_route_or("page", "1").parse::<usize>().unwrap_or(1).max(1);
        let (posts, has_more) = self.posts.page(page, self.page_size);
        Ok(ViewModel::new()
            .with_serialized("posts", &posts)
            .with("page", page as u64)
            .with("has_more", has_more)
            .into())
    }
}

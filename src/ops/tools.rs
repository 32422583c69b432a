use super::analytics::{COST_PER_STORY, summarize};
use super::error::ToolError;
use super::validate;
use crate::automation::{AutomationEngine, decision};
use crate::entity::{brands, submissions};
use crate::instagram::StoryResult;
use crate::store::to_rfc3339;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

static DEFINITIONS: Lazy<Value> = Lazy::new(|| {
    json!([
        {
            "name": "check_story_status",
            "description": "Look up the story behind a submission and verify, reject or keep it pending",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "submissionId": {"type": "string", "description": "Submission UUID"}
                },
                "required": ["submissionId"]
            }
        },
        {
            "name": "verify_submission",
            "description": "Manually verify a submission",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "submissionId": {"type": "string", "description": "Submission UUID"},
                    "views": {"type": "number", "description": "View count", "default": 0},
                    "confidence": {"type": "number", "description": "Confidence (0-100)", "default": 100},
                    "storyUrl": {"type": "string", "description": "Story URL"}
                },
                "required": ["submissionId"]
            }
        },
        {
            "name": "reject_submission",
            "description": "Manually reject a submission",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "submissionId": {"type": "string", "description": "Submission UUID"},
                    "reason": {"type": "string", "description": "Rejection reason"}
                },
                "required": ["submissionId"]
            }
        },
        {
            "name": "get_pending_submissions",
            "description": "List submissions waiting for verification",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "businessId": {"type": "string", "description": "Only this business (optional)"}
                }
            }
        },
        {
            "name": "get_story_analytics",
            "description": "Stories, views and cost efficiency of a business",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "businessId": {"type": "string", "description": "Business UUID"},
                    "timeframe": {
                        "type": "string",
                        "enum": ["all", "today", "week", "month"],
                        "default": "all"
                    }
                },
                "required": ["businessId"]
            }
        },
        {
            "name": "get_all_businesses",
            "description": "List active businesses",
            "inputSchema": {"type": "object", "properties": {}}
        },
        {
            "name": "search_instagram_story",
            "description": "Search for a user's story tagging a business handle",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "username": {"type": "string", "description": "Instagram username without @"},
                    "businessHandle": {"type": "string", "description": "Business handle, with or without @"}
                },
                "required": ["username", "businessHandle"]
            }
        },
        {
            "name": "monitor_submissions_realtime",
            "description": "Run a verification pass over pending submissions now",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "businessId": {"type": "string", "description": "Only this business (optional)"},
                    "intervalMinutes": {"type": "number", "default": 5},
                    "maxIterations": {"type": "number", "default": 12}
                }
            }
        },
        {
            "name": "check_stale_submissions",
            "description": "List submissions pending longer than a threshold",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "hoursThreshold": {"type": "number", "default": 24}
                }
            }
        },
        {
            "name": "get_automation_stats",
            "description": "Counters of the automation engine",
            "inputSchema": {"type": "object", "properties": {}}
        },
        {
            "name": "reset_automation_stats",
            "description": "Zero the counters of the automation engine",
            "inputSchema": {"type": "object", "properties": {}}
        },
        {
            "name": "start_automation",
            "description": "Start the periodic verification loop",
            "inputSchema": {"type": "object", "properties": {}}
        },
        {
            "name": "stop_automation",
            "description": "Stop the periodic verification loop",
            "inputSchema": {"type": "object", "properties": {}}
        }
    ])
});

pub fn definitions() -> &'static Value {
    &DEFINITIONS
}

/// Dispatches named operations against the store, the story lookup and the
/// automation engine.
pub struct Toolbox {
    engine: Arc<AutomationEngine>,
}

impl Toolbox {
    pub fn new(engine: Arc<AutomationEngine>) -> Self {
        Self { engine }
    }

    pub async fn call(&self, name: &str, args: &Value) -> Result<Value, ToolError> {
        info!(tool = name, "Tool called");
        match name {
            "check_story_status" => self.check_story_status(args).await,
            "verify_submission" => self.verify_submission(args).await,
            "reject_submission" => self.reject_submission(args).await,
            "get_pending_submissions" => self.pending_submissions(args).await,
            "get_story_analytics" => self.story_analytics(args).await,
            "get_all_businesses" => self.all_businesses().await,
            "search_instagram_story" => self.search_story(args).await,
            "monitor_submissions_realtime" => self.monitor(args).await,
            "check_stale_submissions" => self.stale_submissions(args).await,
            "get_automation_stats" => Ok(json!({
                "success": true,
                "stats": self.engine.stats().await,
            })),
            "reset_automation_stats" => {
                self.engine.reset_stats().await;
                Ok(json!({
                    "success": true,
                    "message": "Automation stats reset",
                    "stats": self.engine.stats().await,
                }))
            }
            "start_automation" => {
                let started = self.engine.start().await.map_err(ToolError::automation)?;
                let message = if started {
                    "Automation started"
                } else {
                    "Automation already running"
                };
                Ok(json!({
                    "success": true,
                    "message": message,
                    "stats": self.engine.stats().await,
                }))
            }
            "stop_automation" => {
                let stopped = self.engine.stop().await.map_err(ToolError::automation)?;
                let message = if stopped {
                    "Automation stopped"
                } else {
                    "Automation not running"
                };
                Ok(json!({
                    "success": true,
                    "message": message,
                    "stats": self.engine.stats().await,
                }))
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    async fn submission(&self, id: &str) -> Result<submissions::Model, ToolError> {
        self.engine
            .store()
            .submission_by_id(id)
            .await
            .map_err(ToolError::store)?
            .ok_or_else(|| ToolError::NotFound(format!("Submission {}", id)))
    }

    async fn brand(&self, id: &str) -> Result<Option<brands::Model>, ToolError> {
        self.engine
            .store()
            .brand_by_id(id)
            .await
            .map_err(ToolError::store)
    }

    async fn check_story_status(&self, args: &Value) -> Result<Value, ToolError> {
        let id = validate::uuid(str_arg(args, "submissionId"))?;
        let submission = self.submission(id).await?;
        let brand = self
            .brand(&submission.business_id)
            .await?
            .ok_or_else(|| ToolError::NotFound("Business for submission".to_string()))?;
        let handle = brand.instagram_handle.as_str();

        info!(username = %submission.username, business_handle = handle, "Searching for story on Instagram");
        let result = self
            .engine
            .lookup()
            .search_user_story(&submission.username, handle)
            .await
            .map_err(ToolError::lookup)?;
        decision::apply(
            self.engine.store(),
            &submission,
            &result,
            self.engine.auto_verify_confidence(),
        )
        .await
        .map_err(ToolError::store)?;

        Ok(match result {
            StoryResult::Tagged {
                views,
                timestamp,
                url,
                ..
            } => json!({
                "success": true,
                "status": "verified",
                "exists": true,
                "views": views,
                "tagged_correctly": true,
                "business_handle": handle,
                "story_url": url,
                "timestamp": timestamp,
                "message": format!("Story found and verified, {} views", views),
            }),
            StoryResult::Untagged => json!({
                "success": true,
                "status": "rejected",
                "exists": true,
                "views": 0,
                "tagged_correctly": false,
                "business_handle": handle,
                "reason": "not_tagged",
                "message": format!("Story found but it does not tag @{}", handle),
            }),
            StoryResult::NotFound { reason } => json!({
                "success": true,
                "status": "pending",
                "exists": false,
                "views": 0,
                "tagged_correctly": false,
                "business_handle": handle,
                "reason": reason,
                "message": "Story not found yet, it will be checked again",
            }),
        })
    }

    async fn verify_submission(&self, args: &Value) -> Result<Value, ToolError> {
        let id = validate::uuid(str_arg(args, "submissionId"))?;
        let views = num_arg(args, "views", 0.0)?;
        if views < 0.0 {
            return Err(ToolError::InvalidArgument(
                "Views cannot be negative".to_string(),
            ));
        }
        if views >= i64::MAX as f64 {
            return Err(ToolError::InvalidArgument("Views is too large".to_string()));
        }
        let views = views.round() as i64;
        let confidence = validate::confidence(num_arg(args, "confidence", 100.0)?)?;
        let story_url = str_arg(args, "storyUrl");

        let submission = self.submission(id).await?;
        let updated = self
            .engine
            .store()
            .verify_submission(id, views, story_url, confidence)
            .await
            .map_err(ToolError::store)?;
        info!(submission_id = id, username = %submission.username, views, confidence, "Submission manually verified");

        Ok(json!({
            "success": true,
            "status": "verified",
            "submission": submission_json(&updated),
            "message": format!("Submission verified for @{} with {} views", submission.username, views),
        }))
    }

    async fn reject_submission(&self, args: &Value) -> Result<Value, ToolError> {
        let id = validate::uuid(str_arg(args, "submissionId"))?;
        let reason = str_arg(args, "reason");

        let submission = self.submission(id).await?;
        let updated = self
            .engine
            .store()
            .reject_submission(id, reason)
            .await
            .map_err(ToolError::store)?;
        warn!(submission_id = id, username = %submission.username, reason = ?reason, "Submission rejected");

        let message = match reason {
            Some(reason) => format!("Submission rejected for @{}: {}", submission.username, reason),
            None => format!("Submission rejected for @{}", submission.username),
        };
        Ok(json!({
            "success": true,
            "status": "rejected",
            "submission": submission_json(&updated),
            "reason": reason,
            "message": message,
        }))
    }

    async fn pending_submissions(&self, args: &Value) -> Result<Value, ToolError> {
        let business_id = match str_arg(args, "businessId") {
            Some(id) => Some(validate::uuid(Some(id))?),
            None => None,
        };
        let pending = self
            .engine
            .store()
            .pending_submissions(business_id)
            .await
            .map_err(ToolError::store)?;

        let mut brands = BrandCache::default();
        let mut rows = Vec::with_capacity(pending.len());
        for submission in &pending {
            let brand = brands.get(self, &submission.business_id).await?;
            let mut row = submission_json(submission);
            row["business_name"] = json!(brand.as_ref().map(|b| &b.business_name));
            row["business_instagram"] = json!(brand.as_ref().map(|b| &b.instagram_handle));
            rows.push(row);
        }

        Ok(json!({
            "success": true,
            "count": rows.len(),
            "submissions": rows,
            "message": format!("{} submissions waiting for verification", rows.len()),
        }))
    }

    async fn story_analytics(&self, args: &Value) -> Result<Value, ToolError> {
        let id = validate::uuid(str_arg(args, "businessId"))?;
        let timeframe = validate::timeframe(str_arg(args, "timeframe").unwrap_or("all"))?;
        let brand = self
            .brand(id)
            .await?
            .ok_or_else(|| ToolError::NotFound(format!("Business {}", id)))?;

        let verified = self
            .engine
            .store()
            .verified_since(id, timeframe.since(Utc::now()))
            .await
            .map_err(ToolError::store)?;
        let (stats, recent) = summarize(&verified);
        info!(
            business_id = id,
            timeframe = timeframe.as_str(),
            total_stories = stats.total_stories,
            total_views = stats.total_views,
            "Analytics retrieved"
        );

        let window = match timeframe {
            validate::Timeframe::All => String::new(),
            other => format!(" ({})", other.as_str()),
        };
        Ok(json!({
            "success": true,
            "business": {
                "id": brand.id,
                "name": brand.business_name,
                "instagram": brand.instagram_handle,
                "location": brand.location,
            },
            "timeframe": timeframe.as_str(),
            "stats": {
                "totalStories": stats.total_stories,
                "totalViews": stats.total_views,
                "avgViewsPerStory": stats.avg_views_per_story,
                "estimatedCost": stats.estimated_cost,
                "costPerStory": COST_PER_STORY,
                "viewsPerCostUnit": stats.views_per_cost_unit,
                "roi": {
                    "totalInvestment": stats.estimated_cost,
                    "totalReach": stats.total_views,
                    "efficiency": format!("{:.2} views per cost unit", stats.views_per_cost_unit),
                },
            },
            "recentSubmissions": recent,
            "message": format!(
                "{}: {} stories, {} views{}",
                brand.business_name, stats.total_stories, stats.total_views, window
            ),
        }))
    }

    async fn all_businesses(&self) -> Result<Value, ToolError> {
        let brands = self
            .engine
            .store()
            .active_brands()
            .await
            .map_err(ToolError::store)?;
        let rows: Vec<Value> = brands
            .iter()
            .map(|b| {
                json!({
                    "id": b.id,
                    "name": b.business_name,
                    "instagram": b.instagram_handle,
                    "location": b.location,
                    "category": b.category,
                    "status": b.status,
                })
            })
            .collect();
        Ok(json!({
            "success": true,
            "count": rows.len(),
            "businesses": rows,
            "message": format!("Found {} active businesses", rows.len()),
        }))
    }

    async fn search_story(&self, args: &Value) -> Result<Value, ToolError> {
        let username = validate::handle(str_arg(args, "username"), "Username")?;
        let handle = validate::handle(str_arg(args, "businessHandle"), "Business handle")?;

        let result = self
            .engine
            .lookup()
            .search_user_story(username, handle)
            .await
            .map_err(ToolError::lookup)?;
        Ok(match result {
            StoryResult::Tagged {
                story_id,
                views,
                timestamp,
                url,
            } => json!({
                "success": true,
                "found": true,
                "tagged": true,
                "story": {"id": story_id, "views": views, "timestamp": timestamp, "url": url},
                "message": format!("Found a story by @{} tagging @{} with {} views", username, handle, views),
            }),
            StoryResult::Untagged => json!({
                "success": true,
                "found": true,
                "tagged": false,
                "reason": "not_tagged",
                "message": format!("Found a story by @{} but it does not tag @{}", username, handle),
            }),
            StoryResult::NotFound { reason } => json!({
                "success": true,
                "found": false,
                "reason": reason,
                "message": format!("No story by @{} tagging @{}", username, handle),
            }),
        })
    }

    async fn monitor(&self, args: &Value) -> Result<Value, ToolError> {
        let business_id = match str_arg(args, "businessId") {
            Some(id) => Some(validate::uuid(Some(id))?),
            None => None,
        };
        let interval_minutes = num_arg(args, "intervalMinutes", 5.0)?;
        let max_iterations = num_arg(args, "maxIterations", 12.0)?;

        let started = Utc::now();
        let Some(summary) = self
            .engine
            .run_check_for(business_id)
            .await
            .map_err(ToolError::automation)?
        else {
            return Ok(json!({
                "success": true,
                "monitoring": false,
                "skipped": true,
                "message": "Another check is already running, pass skipped",
            }));
        };
        info!(checked = summary.checked, verified = summary.verified, "First monitoring pass completed");

        Ok(json!({
            "success": true,
            "monitoring": true,
            "firstCheck": {
                "timestamp": started.to_rfc3339(),
                "checked": summary.checked,
                "verified": summary.verified,
                "rejected": summary.rejected,
                "stillPending": summary.still_pending,
                "errors": summary.errors,
            },
            "config": {
                "intervalMinutes": interval_minutes,
                "maxIterations": max_iterations,
                "businessId": business_id,
            },
            "message": format!(
                "Monitoring pass: {} verified, {} rejected, {} checked",
                summary.verified, summary.rejected, summary.checked
            ),
        }))
    }

    async fn stale_submissions(&self, args: &Value) -> Result<Value, ToolError> {
        let hours = num_arg(args, "hoursThreshold", 24.0)?;
        if hours < 0.0 {
            return Err(ToolError::InvalidArgument(
                "hoursThreshold cannot be negative".to_string(),
            ));
        }
        let now = Utc::now();
        let cutoff = Duration::try_minutes((hours * 60.0).round() as i64)
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| ToolError::InvalidArgument("hoursThreshold is too large".to_string()))?;
        let stale = self
            .engine
            .store()
            .stale_submissions(cutoff)
            .await
            .map_err(ToolError::store)?;
        warn!(hours_threshold = hours, "Found {} stale submissions", stale.len());

        let mut brands = BrandCache::default();
        let mut rows = Vec::with_capacity(stale.len());
        for submission in &stale {
            let brand = brands.get(self, &submission.business_id).await?;
            let hours_pending = (now.timestamp_micros() - submission.created_at_us) / 3_600_000_000;
            rows.push(json!({
                "id": submission.id,
                "username": submission.username,
                "businessName": brand.as_ref().map(|b| &b.business_name),
                "businessInstagram": brand.as_ref().map(|b| &b.instagram_handle),
                "hoursPending": hours_pending,
                "createdAt": to_rfc3339(submission.created_at_us),
            }));
        }

        Ok(json!({
            "success": true,
            "count": rows.len(),
            "threshold": hours,
            "submissions": rows,
            "message": format!("{} submissions pending longer than {} hours", rows.len(), hours),
        }))
    }
}

#[derive(Default)]
struct BrandCache(HashMap<String, Option<brands::Model>>);

impl BrandCache {
    async fn get(&mut self, toolbox: &Toolbox, id: &str) -> Result<Option<brands::Model>, ToolError> {
        if let Some(brand) = self.0.get(id) {
            return Ok(brand.clone());
        }
        let brand = toolbox.brand(id).await?;
        self.0.insert(id.to_string(), brand.clone());
        Ok(brand)
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn num_arg(args: &Value, key: &str, default: f64) -> Result<f64, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_f64()
            .ok_or_else(|| ToolError::InvalidArgument(format!("{} must be a number", key))),
    }
}

pub(crate) fn submission_json(s: &submissions::Model) -> Value {
    json!({
        "id": s.id,
        "business_id": s.business_id,
        "username": s.username,
        "status": s.status,
        "story_url": s.story_url,
        "views_count": s.views_count,
        "ai_confidence": s.ai_confidence,
        "instagram_followers": s.instagram_followers,
        "created_at": to_rfc3339(s.created_at_us),
        "verified_at": s.verified_at_us.and_then(to_rfc3339),
        "last_checked": s.last_checked_us.and_then(to_rfc3339),
    })
}

//! 健康检查HTTP服务，供外部存活探测使用
//!
//! - `GET /`       运行状态概要
//! - `GET /health` 存活检查
//! 其余路径返回 404。

use chrono::{DateTime, Utc};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use log::{debug, error, info};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::core::error::{BotError, Result};

/// 机器人运行状态，由网关事件更新
pub struct BotStatus {
    started_at: DateTime<Utc>,
    connected: AtomicBool,
    bot_name: RwLock<Option<String>>,
}

impl Default for BotStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl BotStatus {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            connected: AtomicBool::new(false),
            bot_name: RwLock::new(None),
        }
    }

    pub fn set_connected(&self, bot_name: &str) {
        if let Ok(mut name) = self.bot_name.write() {
            *name = Some(bot_name.to_string());
        }
        self.connected.store(true, Ordering::SeqCst);
    }

    pub fn set_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn bot_name(&self) -> Option<String> {
        self.bot_name.read().ok().and_then(|n| n.clone())
    }

    /// `Xh Ym`
    pub fn uptime(&self, now: DateTime<Utc>) -> String {
        let secs = (now - self.started_at).num_seconds().max(0);
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }

    pub fn summary(&self, now: DateTime<Utc>) -> Value {
        let connected = self.is_connected();
        json!({
            "status": "Discord Bot Server Running",
            "bot_status": if connected { "Online" } else { "Offline" },
            "bot_name": if connected {
                self.bot_name().unwrap_or_else(|| "Unknown".to_string())
            } else {
                "Not connected".to_string()
            },
            "uptime": self.uptime(now),
            "timestamp": now.to_rfc3339(),
        })
    }

    pub fn health(&self, now: DateTime<Utc>) -> Value {
        json!({
            "status": "healthy",
            "bot_connected": self.is_connected(),
            "timestamp": now.to_rfc3339(),
        })
    }
}

fn json_response(status: StatusCode, body: Value) -> Response<Body> {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// 路由，独立出来便于测试
pub fn route(method: &Method, path: &str, status: &BotStatus) -> Response<Body> {
    let now = Utc::now();
    if *method != Method::GET {
        return json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            json!({ "error": "method not allowed" }),
        );
    }
    match path {
        "/" => json_response(StatusCode::OK, status.summary(now)),
        "/health" => json_response(StatusCode::OK, status.health(now)),
        _ => json_response(StatusCode::NOT_FOUND, json!({ "error": "not found" })),
    }
}

async fn handle_request(
    req: Request<Body>,
    status: Arc<BotStatus>,
) -> std::result::Result<Response<Body>, Infallible> {
    debug!("健康检查请求: {} {}", req.method(), req.uri().path());
    Ok(route(req.method(), req.uri().path(), &status))
}

pub struct HealthServer {
    addr: SocketAddr,
    status: Arc<BotStatus>,
}

impl HealthServer {
    pub fn new(bind: &str, port: u16, status: Arc<BotStatus>) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", bind, port).parse().map_err(|e| {
            BotError::validation(
                "health.bind",
                format!("invalid address {}:{} ({})", bind, port, e),
            )
        })?;
        Ok(Self { addr, status })
    }

    /// 运行直到出错
    pub async fn run(self) -> Result<()> {
        let status = self.status;
        let make_svc = make_service_fn(move |_conn| {
            let status = Arc::clone(&status);
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let status = Arc::clone(&status);
                    handle_request(req, status)
                }))
            }
        });

        let server = Server::try_bind(&self.addr)
            .map_err(|e| BotError::Other(format!("健康检查端口绑定失败 {}: {}", self.addr, e)))?
            .serve(make_svc);
        info!("✅ 健康检查服务已启动: http://{}", self.addr);

        if let Err(e) = server.await {
            error!("❌ 健康检查服务异常: {}", e);
            return Err(BotError::Other(e.to_string()));
        }
        Ok(())
    }
}

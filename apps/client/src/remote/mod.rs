//! Remote service facade.
//!
//! The sync engine and the auth/teacher commands only see [`RemoteService`].
//! [`HttpRemote`] talks JSON to the backend; tests plug in fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edurural_core::types::{StudentSummary, User, UserRole};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Remote service errors.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Backend error: {status} - {message}")]
    Rejected { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl RemoteError {
    /// True when retrying later could succeed. The sync engine parks
    /// anything else.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unreachable(_) | Self::Timeout(_) => true,
            // Expired sessions and throttling clear up on their own.
            Self::Rejected { status, .. } => {
                *status >= 500 || matches!(status, 401 | 403 | 408 | 429)
            }
            Self::Parse(_) => false,
        }
    }
}

/// A quiz result as acknowledged by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteQuizResult {
    pub id: String,
    pub student_id: String,
    pub lesson_id: String,
    pub score: u8,
    pub answers: Vec<i32>,
    pub completed_at: DateTime<Utc>,
}

/// Operations the backend offers.
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn login(&self, email: &str, password: &str, role: UserRole)
        -> Result<User, RemoteError>;

    async fn signup(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: UserRole,
    ) -> Result<User, RemoteError>;

    async fn save_quiz_result(
        &self,
        student_id: &str,
        lesson_id: &str,
        score: u8,
        answers: &[i32],
    ) -> Result<RemoteQuizResult, RemoteError>;

    async fn get_students(&self) -> Result<Vec<StudentSummary>, RemoteError>;
}

// === API Request Types ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
    role: UserRole,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignupRequest<'a> {
    email: &'a str,
    password: &'a str,
    name: &'a str,
    role: UserRole,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveQuizResultRequest<'a> {
    student_id: &'a str,
    lesson_id: &'a str,
    score: u8,
    answers: &'a [i32],
}

/// JSON-over-HTTP implementation of [`RemoteService`].
#[derive(Clone)]
pub struct HttpRemote {
    client: Client,
    backend_url: String,
    timeout: Duration,
}

impl HttpRemote {
    pub fn new(backend_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            backend_url: backend_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.backend_url, path)
    }

    fn send_error(&self, e: reqwest::Error) -> RemoteError {
        if e.is_timeout() {
            RemoteError::Timeout(self.timeout)
        } else {
            RemoteError::Unreachable(e.to_string())
        }
    }

    async fn decode<T: for<'de> Deserialize<'de>>(
        resp: reqwest::Response,
    ) -> Result<T, RemoteError> {
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Rejected {
                status: status.as_u16(),
                message: if message.is_empty() {
                    status.canonical_reason().unwrap_or("unknown").to_string()
                } else {
                    message
                },
            });
        }
        resp.json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))
    }

    async fn post<B: Serialize + Sync, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RemoteError> {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        Self::decode(resp).await
    }
}

#[async_trait]
impl RemoteService for HttpRemote {
    async fn login(
        &self,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User, RemoteError> {
        self.post(
            "/api/auth/login",
            &LoginRequest {
                email,
                password,
                role,
            },
        )
        .await
    }

    async fn signup(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: UserRole,
    ) -> Result<User, RemoteError> {
        self.post(
            "/api/auth/signup",
            &SignupRequest {
                email,
                password,
                name,
                role,
            },
        )
        .await
    }

    async fn save_quiz_result(
        &self,
        student_id: &str,
        lesson_id: &str,
        score: u8,
        answers: &[i32],
    ) -> Result<RemoteQuizResult, RemoteError> {
        self.post(
            "/api/quiz-results",
            &SaveQuizResultRequest {
                student_id,
                lesson_id,
                score,
                answers,
            },
        )
        .await
    }

    async fn get_students(&self) -> Result<Vec<StudentSummary>, RemoteError> {
        let resp = self
            .client
            .get(self.url("/api/students"))
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        Self::decode(resp).await
    }
}

/// Configurable in-process backend for tests.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::{Notify, Semaphore};

    #[derive(Debug, Clone, PartialEq)]
    pub struct SavedCall {
        pub student_id: String,
        pub lesson_id: String,
        pub score: u8,
        pub answers: Vec<i32>,
    }

    #[derive(Default)]
    pub struct FakeRemote {
        calls: Mutex<Vec<SavedCall>>,
        failing_lessons: Mutex<HashSet<String>>,
        rejecting_lessons: Mutex<HashMap<String, u16>>,
        gate: Option<Arc<Semaphore>>,
        pub entered: Arc<Notify>,
        panic_once: AtomicBool,
        delay: Option<Duration>,
        pub students: Vec<StudentSummary>,
    }

    impl FakeRemote {
        pub fn new() -> Self {
            Self::default()
        }

        /// Reject saves for these lessons until [`FakeRemote::recover`].
        pub fn failing_lessons(self, lessons: &[&str]) -> Self {
            *self.failing_lessons.lock().unwrap() =
                lessons.iter().map(|l| l.to_string()).collect();
            self
        }

        /// Answer saves for these lessons with `status` until [`FakeRemote::recover`].
        pub fn rejecting_lessons(self, lessons: &[&str], status: u16) -> Self {
            *self.rejecting_lessons.lock().unwrap() =
                lessons.iter().map(|l| (l.to_string(), status)).collect();
            self
        }

        /// Each save waits for a permit on `gate`.
        pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
            self.gate = Some(gate);
            self
        }

        pub fn panicking_once(self) -> Self {
            self.panic_once.store(true, Ordering::SeqCst);
            self
        }

        pub fn delayed(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn recover(&self) {
            self.failing_lessons.lock().unwrap().clear();
            self.rejecting_lessons.lock().unwrap().clear();
        }

        pub fn calls(&self) -> Vec<SavedCall> {
            self.calls.lock().unwrap().clone()
        }

        fn user(email: &str, name: &str, role: UserRole) -> User {
            User {
                uid: format!("uid_{email}"),
                email: email.to_string(),
                display_name: name.to_string(),
                role,
                created_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl RemoteService for FakeRemote {
        async fn login(
            &self,
            email: &str,
            password: &str,
            role: UserRole,
        ) -> Result<User, RemoteError> {
            if password.is_empty() {
                return Err(RemoteError::Rejected {
                    status: 401,
                    message: "invalid credentials".into(),
                });
            }
            let name = email.split('@').next().unwrap_or(email);
            Ok(Self::user(email, name, role))
        }

        async fn signup(
            &self,
            email: &str,
            _password: &str,
            name: &str,
            role: UserRole,
        ) -> Result<User, RemoteError> {
            Ok(Self::user(email, name, role))
        }

        async fn save_quiz_result(
            &self,
            student_id: &str,
            lesson_id: &str,
            score: u8,
            answers: &[i32],
        ) -> Result<RemoteQuizResult, RemoteError> {
            self.entered.notify_one();
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await;
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.panic_once.swap(false, Ordering::SeqCst) {
                panic!("remote blew up");
            }
            if self.failing_lessons.lock().unwrap().contains(lesson_id) {
                return Err(RemoteError::Unreachable("connection refused".into()));
            }
            if let Some(status) = self.rejecting_lessons.lock().unwrap().get(lesson_id) {
                return Err(RemoteError::Rejected {
                    status: *status,
                    message: "rejected".into(),
                });
            }

            self.calls.lock().unwrap().push(SavedCall {
                student_id: student_id.to_string(),
                lesson_id: lesson_id.to_string(),
                score,
                answers: answers.to_vec(),
            });
            Ok(RemoteQuizResult {
                id: format!("remote_{student_id}_{lesson_id}"),
                student_id: student_id.to_string(),
                lesson_id: lesson_id.to_string(),
                score,
                answers: answers.to_vec(),
                completed_at: Utc::now(),
            })
        }

        async fn get_students(&self) -> Result<Vec<StudentSummary>, RemoteError> {
            Ok(self.students.clone())
        }
    }
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use axum_extra::extract::cookie::{Cookie, SameSite};
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};

use crate::error::Error;

/// Cookie jar with browser expiry semantics.
///
/// Cookies whose `Expires` has passed are invisible to [`get`](Self::get).
/// When opened from a file, cookies with an explicit expiry are written back
/// on every change; session-scoped cookies live only as long as the process.
#[derive(Debug)]
pub struct CookieStore {
    cookies: Mutex<BTreeMap<String, Cookie<'static>>>,
    path: Option<PathBuf>,
}

impl CookieStore {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            cookies: Mutex::new(BTreeMap::new()),
            path: None,
        }
    }

    /// Opens a file-backed jar, loading unexpired cookies from `path` if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let contents = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(Error::Storage(format!("{}: {e}", path.display()))),
        };

        let now = OffsetDateTime::now_utc();
        let mut cookies = BTreeMap::new();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            match Cookie::parse_encoded(line.to_owned()) {
                Ok(cookie) if !is_expired(&cookie, now) => {
                    cookies.insert(cookie.name().to_owned(), cookie.into_owned());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, path = %path.display(), "skipping unparsable cookie"),
            }
        }

        Ok(Self {
            cookies: Mutex::new(cookies),
            path: Some(path),
        })
    }

    /// Value of an unexpired cookie.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        let now = OffsetDateTime::now_utc();
        self.cookies
            .lock()
            .get(name)
            .filter(|c| !is_expired(c, now))
            .map(|c| c.value().to_owned())
    }

    /// Expiry of a stored cookie; `None` for session cookies or missing ones.
    #[must_use]
    pub fn expires_at(&self, name: &str) -> Option<OffsetDateTime> {
        self.cookies.lock().get(name).and_then(|c| c.expires_datetime())
    }

    /// Inserts or replaces a cookie by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backing file cannot be written. The
    /// jar is left as it was.
    pub fn set(&self, cookie: Cookie<'static>) -> Result<(), Error> {
        self.set_all([cookie])
    }

    /// Inserts several cookies with a single write-back. Either all of them
    /// are stored or none is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backing file cannot be written. The
    /// jar is left as it was.
    pub fn set_all(&self, batch: impl IntoIterator<Item = Cookie<'static>>) -> Result<(), Error> {
        let mut cookies = self.cookies.lock();
        let replaced: Vec<(String, Option<Cookie<'static>>)> = batch
            .into_iter()
            .map(|cookie| {
                let name = cookie.name().to_owned();
                let old = cookies.insert(name.clone(), cookie);
                (name, old)
            })
            .collect();

        if let Err(e) = self.persist(&cookies) {
            for (name, old) in replaced.into_iter().rev() {
                match old {
                    Some(cookie) => {
                        cookies.insert(name, cookie);
                    }
                    None => {
                        cookies.remove(&name);
                    }
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backing file cannot be written.
    pub fn remove(&self, name: &str) -> Result<(), Error> {
        let mut cookies = self.cookies.lock();
        if cookies.remove(name).is_none() {
            return Ok(());
        }
        self.persist(&cookies)
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn persist(&self, cookies: &BTreeMap<String, Cookie<'static>>) -> Result<(), Error> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let now = OffsetDateTime::now_utc();
        let mut out = String::new();
        for cookie in cookies.values() {
            if cookie.expires_datetime().is_some() && !is_expired(cookie, now) {
                out.push_str(&cookie.encoded().to_string());
                out.push('\n');
            }
        }
        super::write_atomic(path, out.as_bytes())
    }
}

impl Default for CookieStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn is_expired(cookie: &Cookie<'_>, now: OffsetDateTime) -> bool {
    cookie.expires_datetime().is_some_and(|at| at <= now)
}

/// Create a cookie expiring at `expires`, or a session cookie when `None`.
pub(crate) fn expiring_cookie(
    name: &str,
    value: String,
    expires: Option<OffsetDateTime>,
) -> Cookie<'static> {
    let builder = Cookie::build((name.to_owned(), value))
        .path("/")
        .same_site(SameSite::Lax);
    match expires {
        Some(at) => builder.expires(at).build(),
        None => builder.build(),
    }
}

const SECONDS_PER_DAY: i64 = 86_400;

/// Create a cookie living for `ttl_days`, or a session cookie when `None`.
///
/// Fails with [`Error::Config`] when the expiry falls outside the calendar.
pub(crate) fn cookie_for_days(
    name: &str,
    value: String,
    ttl_days: Option<i64>,
) -> Result<Cookie<'static>, Error> {
    let expires = match ttl_days {
        Some(days) => Some(
            days.checked_mul(SECONDS_PER_DAY)
                .map(Duration::seconds)
                .and_then(|ttl| OffsetDateTime::now_utc().checked_add(ttl))
                .ok_or_else(|| {
                    Error::Config(format!("cookie lifetime of {days} days is out of range"))
                })?,
        ),
        None => None,
    };
    Ok(expiring_cookie(name, value, expires))
}

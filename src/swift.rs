//! Client to the Swift (Rackspace Cloud Files) object storage HTTP API.

use crate::checksummer::Checksum;
use crate::config::{BenchConfig, ConfigError};
use crate::identity::{authenticate, Credentials, Session};
use crate::objectstore::{
    ChunkReader, ContainerInfo, ObjectChunks, ObjectMeta, ObjectStore, StorageError,
};

use log::{debug, info};
use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, CONTENT_TYPE, ETAG};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

const AUTH_TOKEN: &str = "X-Auth-Token";
const OBJECT_COUNT: &str = "X-Container-Object-Count";
const BYTES_USED: &str = "X-Container-Bytes-Used";
const LISTING_LIMIT: usize = 10_000;

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
    hash: String,
    bytes: u64,
}

/// A Swift object store.
pub struct SwiftStore {
    client: Client,
    auth_url: String,
    credentials: Credentials,
    region: String,
    internal: bool,
    session: Mutex<Session>,
}

impl SwiftStore {
    /// Log in to the identity service and create a store client.
    pub fn connect(config: &BenchConfig) -> Result<Self, StorageError> {
        info!("creating swift store with config: {:#?}", config);

        let credentials = config
            .credentials
            .clone()
            .ok_or(ConfigError::NoCredentials)?;

        let client = Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls_cert)
            .timeout(config.timeout)
            .build()
            .map_err(StorageError::ReqwestError)?;

        let session = authenticate(
            &client,
            &config.auth_url,
            &credentials,
            &config.region,
            config.internal_url,
        )?;
        info!("using object store at {}", session.storage_url);

        Ok(Self {
            client,
            auth_url: config.auth_url.clone(),
            credentials,
            region: config.region.clone(),
            internal: config.internal_url,
            session: Mutex::new(session),
        })
    }

    fn session(&self) -> Session {
        self.session.lock().unwrap().clone()
    }

    fn reauthenticate(&self) -> Result<Session, StorageError> {
        let session = authenticate(
            &self.client,
            &self.auth_url,
            &self.credentials,
            &self.region,
            self.internal,
        )?;
        *self.session.lock().unwrap() = session.clone();
        Ok(session)
    }

    // Send a request built by `build`. If the token has expired, log
    // in again and resend once.
    fn send<F>(&self, what: &str, build: F) -> Result<Response, StorageError>
    where
        F: Fn(&Client, Url) -> RequestBuilder,
    {
        let session = self.session();
        debug!("{}", what);
        let res = build(&self.client, session.storage_url.clone())
            .header(AUTH_TOKEN, &session.token)
            .send()
            .map_err(StorageError::ReqwestError)?;
        if res.status() != StatusCode::UNAUTHORIZED {
            return Ok(res);
        }

        info!("{}: token was refused, logging in again", what);
        let session = self.reauthenticate()?;
        build(&self.client, session.storage_url)
            .header(AUTH_TOKEN, &session.token)
            .send()
            .map_err(StorageError::ReqwestError)
    }
}

// Append path segments to the account URL, percent-encoding them.
fn url(mut base: Url, segments: &[&str]) -> Url {
    if let Ok(mut path) = base.path_segments_mut() {
        path.pop_if_empty();
        path.extend(segments);
    }
    base
}

fn header_u64(headers: &HeaderMap, name: &str) -> u64 {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

impl ObjectStore for SwiftStore {
    fn create_container(&self, name: &str) -> Result<ContainerInfo, StorageError> {
        let what = format!("PUT container {}", name);
        let res = self.send(&what, |client, base| client.put(url(base, &[name])))?;
        match res.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => self.get_container(name),
            status => Err(StorageError::Status(what, status)),
        }
    }

    fn delete_container(&self, name: &str) -> Result<(), StorageError> {
        let what = format!("DELETE container {}", name);
        let res = self.send(&what, |client, base| client.delete(url(base, &[name])))?;
        match res.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(StorageError::ContainerNotFound(name.to_string())),
            StatusCode::CONFLICT => Err(StorageError::ContainerNotEmpty(name.to_string())),
            status => Err(StorageError::Status(what, status)),
        }
    }

    fn get_container(&self, name: &str) -> Result<ContainerInfo, StorageError> {
        let what = format!("HEAD container {}", name);
        let res = self.send(&what, |client, base| client.head(url(base, &[name])))?;
        match res.status() {
            status if status.is_success() => Ok(ContainerInfo {
                name: name.to_string(),
                object_count: header_u64(res.headers(), OBJECT_COUNT),
                bytes_used: header_u64(res.headers(), BYTES_USED),
            }),
            StatusCode::NOT_FOUND => Err(StorageError::ContainerNotFound(name.to_string())),
            status => Err(StorageError::Status(what, status)),
        }
    }

    fn list_objects(&self, container: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        let what = format!("GET container {}", container);
        let limit = LISTING_LIMIT.to_string();
        let mut objects = vec![];
        let mut marker = String::new();

        loop {
            let res = self.send(&what, |client, base| {
                client.get(url(base, &[container])).query(&[
                    ("format", "json"),
                    ("limit", limit.as_str()),
                    ("marker", marker.as_str()),
                ])
            })?;
            let page: Vec<ListedObject> = match res.status() {
                StatusCode::NO_CONTENT => vec![],
                StatusCode::OK => {
                    let body = res.bytes().map_err(StorageError::ReqwestError)?;
                    serde_json::from_slice(&body).map_err(StorageError::JsonParse)?
                }
                StatusCode::NOT_FOUND => {
                    return Err(StorageError::ContainerNotFound(container.to_string()))
                }
                status => return Err(StorageError::Status(what, status)),
            };

            let full = page.len() == LISTING_LIMIT;
            if let Some(last) = page.last() {
                marker = last.name.clone();
            }
            objects.extend(page.into_iter().map(|o| ObjectMeta {
                name: o.name,
                etag: o.hash,
                bytes: o.bytes,
            }));
            if !full {
                break;
            }
        }

        Ok(objects)
    }

    fn store_object(
        &self,
        container: &str,
        name: &str,
        data: Vec<u8>,
        etag: &Checksum,
    ) -> Result<ObjectMeta, StorageError> {
        let what = format!("PUT object {}/{}", container, name);
        let bytes = data.len() as u64;
        let data: Arc<[u8]> = Arc::from(data);

        let res = self.send(&what, |client, base| {
            client
                .put(url(base, &[container, name]))
                .header(ETAG, etag.as_str())
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(Body::sized(Cursor::new(Arc::clone(&data)), bytes))
        })?;

        match res.status() {
            StatusCode::CREATED => {
                let etag = res
                    .headers()
                    .get(ETAG)
                    .and_then(|value| value.to_str().ok())
                    .filter(|value| !value.trim().is_empty())
                    .ok_or_else(|| {
                        StorageError::MissingEtag(container.to_string(), name.to_string())
                    })?
                    .to_string();
                debug!("stored {}/{} with etag {}", container, name, etag);
                Ok(ObjectMeta {
                    name: name.to_string(),
                    etag,
                    bytes,
                })
            }
            StatusCode::UNPROCESSABLE_ENTITY => Err(StorageError::EtagMismatch(
                container.to_string(),
                name.to_string(),
                etag.to_string(),
            )),
            StatusCode::NOT_FOUND => Err(StorageError::ContainerNotFound(container.to_string())),
            status => Err(StorageError::Status(what, status)),
        }
    }

    fn fetch_object(
        &self,
        container: &str,
        name: &str,
        chunk_size: usize,
    ) -> Result<ObjectChunks<'_>, StorageError> {
        let what = format!("GET object {}/{}", container, name);
        let res = self.send(&what, |client, base| {
            client.get(url(base, &[container, name]))
        })?;
        match res.status() {
            StatusCode::OK => Ok(Box::new(ChunkReader::new(res, chunk_size))),
            StatusCode::NOT_FOUND => Err(StorageError::ObjectNotFound(
                container.to_string(),
                name.to_string(),
            )),
            status => Err(StorageError::Status(what, status)),
        }
    }

    fn delete_all_objects(&self, container: &str) -> Result<(), StorageError> {
        let objects = self.list_objects(container)?;
        info!("deleting {} objects from {}", objects.len(), container);
        for object in objects {
            match self.delete_object(container, &object.name) {
                Ok(()) | Err(StorageError::ObjectNotFound(_, _)) => (),
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn delete_object(&self, container: &str, name: &str) -> Result<(), StorageError> {
        let what = format!("DELETE object {}/{}", container, name);
        let res = self.send(&what, |client, base| {
            client.delete(url(base, &[container, name]))
        })?;
        match res.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(StorageError::ObjectNotFound(
                container.to_string(),
                name.to_string(),
            )),
            status => Err(StorageError::Status(what, status)),
        }
    }
}

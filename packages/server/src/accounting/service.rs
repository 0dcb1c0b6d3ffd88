use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::*;
use stash_common::storage::{BlobLocation, BlobStore, BoxReader, StagedBlob, StorageError};
use tokio::io::AsyncRead;
use tracing::{Instrument, error, info, instrument, warn};
use uuid::Uuid;

use super::{FileError, ledger};
use crate::entity::{file, storage, user};
use crate::utils::filename::{validate_directory_path, validate_display_name};

/// Metadata of an upload, everything except the bytes.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub path: String,
    pub name: String,
    pub note: String,
    pub origin_name: String,
    pub content_type: String,
}

impl NewFile {
    /// Check the path grammar and the display name, trimming the name.
    pub fn validate(&mut self) -> Result<(), FileError> {
        validate_directory_path(&self.path).map_err(|e| FileError::InvalidPath(e.message()))?;
        let name = validate_display_name(&self.name)
            .map_err(|e| FileError::InvalidName(e.message()))?
            .to_string();
        self.name = name;
        Ok(())
    }
}

/// Editable fields of a stored file. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct FileUpdate {
    pub name: Option<String>,
    pub note: Option<String>,
}

/// Storage accounting core.
///
/// Keeps the blob store, the `file` registry and the per-owner ledger in step:
/// every create, rename and delete runs in one transaction that holds the
/// owner's storage row lock, and the filesystem side is undone if the commit
/// fails.
#[derive(Clone)]
pub struct FileService {
    db: DatabaseConnection,
    blobs: Arc<dyn BlobStore>,
    max_bytes: u64,
    max_upload_size: u64,
}

impl FileService {
    pub fn new(
        db: DatabaseConnection,
        blobs: Arc<dyn BlobStore>,
        max_bytes: u64,
        max_upload_size: u64,
    ) -> Self {
        Self {
            db,
            blobs,
            max_bytes,
            max_upload_size,
        }
    }

    /// Per-owner byte ceiling.
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Spool an upload into staging. Reading stops as soon as the stream
    /// outgrows the owner's remaining quota or the upload size limit.
    pub async fn receive(
        &self,
        owner_id: i32,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<StagedBlob, FileError> {
        let storage = ledger::find_by_owner(&self.db, owner_id).await?;
        let headroom = ledger::headroom(&storage, self.max_bytes);
        let limit = std::cmp::Ord::min(headroom, self.max_upload_size);

        match self.blobs.stage(reader, limit).await {
            Ok(staged) => Ok(staged),
            Err(StorageError::SizeLimitExceeded { actual, .. }) if headroom < self.max_upload_size => {
                Err(FileError::QuotaExceeded {
                    used: self.max_bytes - headroom,
                    incoming: actual,
                    max: self.max_bytes,
                })
            }
            Err(StorageError::SizeLimitExceeded { .. }) => Err(FileError::TooLarge {
                limit: self.max_upload_size,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Fails with `DuplicateFile` when `new` would collide with a file the
    /// owner already has. [`FileService::create`] checks again under the lock.
    pub async fn check_free(&self, owner_id: i32, new: &NewFile) -> Result<(), FileError> {
        let storage = ledger::find_by_owner(&self.db, owner_id).await?;
        ensure_free(&self.db, storage.id, &new.path, &new.name).await
    }

    /// Register a staged upload for `owner_id` and account for it.
    #[instrument(skip(self, new, staged), fields(size = staged.size()))]
    pub async fn create(
        &self,
        owner_id: i32,
        mut new: NewFile,
        staged: StagedBlob,
    ) -> Result<file::Model, FileError> {
        new.validate()?;

        let storage = ledger::find_by_owner(&self.db, owner_id).await?;
        ensure_free(&self.db, storage.id, &new.path, &new.name).await?;
        ledger::check_headroom(&storage, staged.size(), self.max_bytes)?;

        self.run_detached(move |svc| async move { svc.commit_create(owner_id, new, staged).await })
            .await
    }

    async fn commit_create(
        &self,
        owner_id: i32,
        new: NewFile,
        staged: StagedBlob,
    ) -> Result<file::Model, FileError> {
        let txn = self.db.begin().await?;

        // Re-check under the lock; another request may have won the race.
        let storage = ledger::lock_by_owner(&txn, owner_id).await?;
        ledger::check_headroom(&storage, staged.size(), self.max_bytes)?;
        ensure_free(&txn, storage.id, &new.path, &new.name).await?;

        let owner = user::Entity::find_by_id(owner_id)
            .one(&txn)
            .await?
            .ok_or(FileError::NotFound("User"))?;
        let location = BlobLocation::new(&owner.username, &new.path, &new.name)?;

        let size = staged.size();
        let duplicate = FileError::DuplicateFile {
            path: new.path.clone(),
            name: new.name.clone(),
        };
        let record = file::ActiveModel {
            storage_id: Set(storage.id),
            path: Set(new.path),
            name: Set(new.name),
            origin_name: Set(new.origin_name),
            public_id: Set(Uuid::new_v4()),
            content_type: Set(new.content_type),
            size: Set(i64::try_from(size).map_err(|_| FileError::TooLarge {
                limit: self.max_upload_size,
            })?),
            content_hash: Set(staged.content_hash().to_hex()),
            location: Set(location.to_string()),
            note: Set(new.note),
            last_download: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => duplicate,
            _ => FileError::from(e),
        })?;

        ledger::on_file_created(&txn, storage.id, size, self.max_bytes).await?;

        match self.blobs.put(staged, &location).await {
            Ok(()) => {}
            Err(StorageError::AlreadyExists(_)) => {
                warn!(
                    storage_id = storage.id,
                    location = %location,
                    "Blob location occupied by bytes the registry does not know"
                );
                return Err(FileError::LocationOccupied(location.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = txn.commit().await {
            if let Err(cleanup) = self.blobs.delete(&location).await {
                error!(location = %location, error = %cleanup, "Failed to remove blob of uncommitted file");
            } else {
                warn!(location = %location, "Removed blob of uncommitted file");
            }
            return Err(e.into());
        }

        info!(
            storage_id = storage.id,
            file_id = record.id,
            size,
            location = %location,
            "File created"
        );
        Ok(record)
    }

    /// Resolve a public id and open the bytes for streaming, stamping
    /// `last_download`.
    pub async fn open(&self, public_id: Uuid) -> Result<(file::Model, BoxReader), FileError> {
        let record = file::Entity::find()
            .filter(file::Column::PublicId.eq(public_id))
            .one(&self.db)
            .await?
            .ok_or(FileError::NotFound("File"))?;

        let location = BlobLocation::parse(&record.location)?;
        let reader = match self.blobs.get_stream(&location).await {
            Ok(reader) => reader,
            Err(StorageError::NotFound(_)) => {
                warn!(
                    file_id = record.id,
                    location = %location,
                    "Registered file has no bytes on disk"
                );
                return Err(FileError::NotFound("File"));
            }
            Err(e) => return Err(e.into()),
        };

        let now = Utc::now();
        file::Entity::update_many()
            .col_expr(file::Column::LastDownload, Expr::value(now))
            .filter(file::Column::Id.eq(record.id))
            .exec(&self.db)
            .await?;

        Ok((
            file::Model {
                last_download: Some(now),
                ..record
            },
            reader,
        ))
    }

    pub async fn find(&self, file_id: i32) -> Result<file::Model, FileError> {
        file::Entity::find_by_id(file_id)
            .one(&self.db)
            .await?
            .ok_or(FileError::NotFound("File"))
    }

    /// Id of the user owning `file_id`.
    pub async fn owner_of(&self, file_id: i32) -> Result<i32, FileError> {
        let record = self.find(file_id).await?;
        let storage = storage::Entity::find_by_id(record.storage_id)
            .one(&self.db)
            .await?
            .ok_or(FileError::NotFound("Storage"))?;
        Ok(storage.owner_id)
    }

    /// Rename and/or re-annotate a file. A rename moves the bytes within
    /// their directory; the ledger is untouched.
    #[instrument(skip(self, update))]
    pub async fn update(&self, file_id: i32, update: FileUpdate) -> Result<file::Model, FileError> {
        let new_name = update
            .name
            .as_deref()
            .map(|name| {
                validate_display_name(name)
                    .map(str::to_string)
                    .map_err(|e| FileError::InvalidName(e.message()))
            })
            .transpose()?;

        self.run_detached(move |svc| async move {
            svc.commit_update(file_id, new_name, update.note).await
        })
        .await
    }

    async fn commit_update(
        &self,
        file_id: i32,
        new_name: Option<String>,
        note: Option<String>,
    ) -> Result<file::Model, FileError> {
        let txn = self.db.begin().await?;
        let current = lock_file(&txn, file_id).await?;

        let mut active: file::ActiveModel = current.clone().into();
        let mut changed = false;
        let mut relocation: Option<(BlobLocation, BlobLocation)> = None;

        let mut target_name = current.name.clone();

        if let Some(name) = new_name.filter(|name| *name != current.name) {
            ensure_free(&txn, current.storage_id, &current.path, &name).await?;
            let from = BlobLocation::parse(&current.location)?;
            let to = from.with_filename(&name)?;
            target_name.clone_from(&name);
            active.name = Set(name);
            active.location = Set(to.to_string());
            relocation = Some((from, to));
            changed = true;
        }
        if let Some(note) = note {
            active.note = Set(note);
            changed = true;
        }

        if !changed {
            return Ok(current);
        }

        let updated = active.update(&txn).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => FileError::DuplicateFile {
                path: current.path.clone(),
                name: target_name.clone(),
            },
            _ => FileError::from(e),
        })?;

        let relocated = match relocation {
            Some((from, to)) => match self.blobs.relocate(&from, &to).await {
                Ok(()) => Some((from, to)),
                Err(StorageError::NotFound(_)) => {
                    warn!(file_id, location = %from, "Renamed file has no bytes on disk");
                    None
                }
                Err(StorageError::AlreadyExists(_)) => {
                    warn!(file_id, location = %to, "Rename target occupied by unregistered bytes");
                    return Err(FileError::LocationOccupied(to.to_string()));
                }
                Err(e) => return Err(e.into()),
            },
            None => None,
        };

        if let Err(e) = txn.commit().await {
            if let Some((from, to)) = &relocated {
                if let Err(undo) = self.blobs.relocate(to, from).await {
                    error!(file_id, from = %to, to = %from, error = %undo, "Failed to undo blob rename");
                } else {
                    warn!(file_id, location = %from, "Reverted blob rename of uncommitted update");
                }
            }
            return Err(e.into());
        }

        if let Some((from, to)) = relocated {
            info!(file_id, from = %from, to = %to, "File renamed");
        }
        Ok(updated)
    }

    /// Remove a file, its bytes and its share of the ledger.
    #[instrument(skip(self))]
    pub async fn delete(&self, file_id: i32) -> Result<file::Model, FileError> {
        self.run_detached(move |svc| async move { svc.commit_delete(file_id).await })
            .await
    }

    async fn commit_delete(&self, file_id: i32) -> Result<file::Model, FileError> {
        let txn = self.db.begin().await?;
        let record = lock_file(&txn, file_id).await?;

        file::Entity::delete_by_id(record.id).exec(&txn).await?;
        ledger::on_file_deleted(&txn, record.storage_id, record.size).await?;

        // Moved aside rather than removed so a failed commit can put it back.
        let detached = match BlobLocation::parse(&record.location) {
            Ok(location) => self.blobs.detach(&location).await?,
            Err(e) => {
                warn!(file_id, location = %record.location, error = %e, "Unparseable blob location");
                None
            }
        };
        if detached.is_none() {
            warn!(file_id, location = %record.location, "Deleted file had no bytes on disk");
        }

        if let Err(e) = txn.commit().await {
            if let Some(detached) = detached {
                let location = detached.location().clone();
                if let Err(undo) = self.blobs.restore(detached).await {
                    error!(file_id, location = %location, error = %undo, "Failed to restore blob of uncommitted delete");
                } else {
                    warn!(file_id, location = %location, "Restored blob of uncommitted delete");
                }
            }
            return Err(e.into());
        }

        if let Some(detached) = detached
            && let Err(e) = self.blobs.discard(detached).await
        {
            warn!(file_id, error = %e, "Failed to discard deleted blob");
        }

        info!(
            storage_id = record.storage_id,
            file_id,
            size = record.size,
            "File deleted"
        );
        Ok(record)
    }

    /// Run the commit phase on its own task so a dropped request cannot stop
    /// it between the filesystem step and the transaction commit.
    async fn run_detached<T, F, Fut>(&self, f: F) -> Result<T, FileError>
    where
        F: FnOnce(FileService) -> Fut,
        Fut: Future<Output = Result<T, FileError>> + Send + 'static,
        T: Send + 'static,
    {
        tokio::spawn(f(self.clone()).in_current_span())
            .await
            .map_err(|e| FileError::Aborted(e.to_string()))?
    }
}

/// Fails with `DuplicateFile` when `(path, name)` is taken in the storage.
async fn ensure_free<C: ConnectionTrait>(
    conn: &C,
    storage_id: i32,
    path: &str,
    name: &str,
) -> Result<(), FileError> {
    let taken = file::Entity::find()
        .filter(file::Column::StorageId.eq(storage_id))
        .filter(file::Column::Path.eq(path))
        .filter(file::Column::Name.eq(name))
        .count(conn)
        .await?;
    if taken > 0 {
        return Err(FileError::DuplicateFile {
            path: path.to_string(),
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Lock the owning storage, then the file row. Every writer takes the locks
/// in this order.
async fn lock_file<C: ConnectionTrait>(conn: &C, file_id: i32) -> Result<file::Model, FileError> {
    let storage_id = file::Entity::find_by_id(file_id)
        .one(conn)
        .await?
        .ok_or(FileError::NotFound("File"))?
        .storage_id;
    ledger::lock(conn, storage_id).await?;

    // The row may have been deleted while we waited for the storage lock.
    file::Entity::find_by_id(file_id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or(FileError::NotFound("File"))
}

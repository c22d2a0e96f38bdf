use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::db;
use crate::error::{internal_error, DocshareError};
use crate::models::{
    Document, NewDocument, NewSharedDocument, NewUser, SharedDocument, User,
};
use crate::repository::Repository;
use crate::schema;
use crate::types::{AccessLevel, GrantOutcome};

pub struct PgRepository {
    pool: db::DbConnectionPool,
}

impl PgRepository {
    pub fn new(pool: db::DbConnectionPool) -> Self {
        Self { pool }
    }

    async fn connect(&self) -> Result<db::DbConnection, DocshareError> {
        self.pool.get().await.map_err(internal_error)
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn upsert_user(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<User, DocshareError> {
        let mut conn = self.connect().await?;
        let new_user = NewUser {
            id: Uuid::new_v4(),
            email,
            name,
        };
        diesel::insert_into(schema::users::table)
            .values(&new_user)
            .on_conflict(schema::users::email)
            .do_update()
            .set(schema::users::name.eq(excluded(schema::users::name)))
            .returning(User::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(internal_error)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DocshareError> {
        let mut conn = self.connect().await?;
        schema::users::table
            .find(id)
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(internal_error)
    }

    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<User>, DocshareError> {
        let mut conn = self.connect().await?;
        schema::users::table
            .filter(schema::users::email.eq(email))
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(internal_error)
    }

    async fn set_admin(
        &self,
        email: &str,
        is_admin: bool,
    ) -> Result<Option<User>, DocshareError> {
        let mut conn = self.connect().await?;
        diesel::update(schema::users::table)
            .filter(schema::users::email.eq(email))
            .set(schema::users::is_admin.eq(is_admin))
            .returning(User::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(internal_error)
    }

    async fn insert_document(
        &self,
        doc: NewDocument,
    ) -> Result<Document, DocshareError> {
        let mut conn = self.connect().await?;
        diesel::insert_into(schema::documents::table)
            .values(&doc)
            .returning(Document::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(internal_error)
    }

    async fn find_document(
        &self,
        id: Uuid,
    ) -> Result<Option<Document>, DocshareError> {
        let mut conn = self.connect().await?;
        schema::documents::table
            .find(id)
            .select(Document::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(internal_error)
    }

    async fn owned_documents(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<Document>, DocshareError> {
        let mut conn = self.connect().await?;
        schema::documents::table
            .filter(schema::documents::owner_id.eq(owner_id))
            .order(schema::documents::created_at.desc())
            .select(Document::as_select())
            .load(&mut conn)
            .await
            .map_err(internal_error)
    }

    async fn shared_with(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(SharedDocument, Document, User)>, DocshareError> {
        let mut conn = self.connect().await?;
        let rows: Vec<(SharedDocument, Document)> =
            schema::shared_documents::table
                .inner_join(schema::documents::table)
                .filter(schema::shared_documents::user_id.eq(user_id))
                .order(schema::documents::created_at.desc())
                .select((SharedDocument::as_select(), Document::as_select()))
                .load(&mut conn)
                .await
                .map_err(internal_error)?;

        let owner_ids: Vec<Uuid> = rows.iter().map(|(_, d)| d.owner_id).collect();
        let owners: Vec<User> = schema::users::table
            .filter(schema::users::id.eq_any(owner_ids))
            .select(User::as_select())
            .load(&mut conn)
            .await
            .map_err(internal_error)?;

        let shared = rows
            .into_iter()
            .filter_map(|(grant, doc)| {
                let owner = owners.iter().find(|u| u.id == doc.owner_id)?;
                Some((grant, doc, owner.clone()))
            })
            .collect();
        Ok(shared)
    }

    async fn find_grant(
        &self,
        document_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<SharedDocument>, DocshareError> {
        let mut conn = self.connect().await?;
        schema::shared_documents::table
            .find((document_id, user_id))
            .select(SharedDocument::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(internal_error)
    }

    async fn upsert_grant(
        &self,
        document_id: Uuid,
        user_id: Uuid,
        access: AccessLevel,
    ) -> Result<GrantOutcome, DocshareError> {
        let mut conn = self.connect().await?;
        let new_grant = NewSharedDocument {
            document_id,
            user_id,
            access: access.as_str(),
        };
        // A concurrent revoke can remove the row between the two statements
        for _ in 0..3 {
            let inserted = diesel::insert_into(schema::shared_documents::table)
                .values(&new_grant)
                .on_conflict((
                    schema::shared_documents::document_id,
                    schema::shared_documents::user_id,
                ))
                .do_nothing()
                .execute(&mut conn)
                .await
                .map_err(internal_error)?;
            if inserted != 0 {
                return Ok(GrantOutcome::Created);
            }
            let updated = diesel::update(
                schema::shared_documents::table.find((document_id, user_id)),
            )
            .set((
                schema::shared_documents::access.eq(access.as_str()),
                schema::shared_documents::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await
            .map_err(internal_error)?;
            if updated != 0 {
                return Ok(GrantOutcome::Updated);
            }
        }
        Err(DocshareError::internal("Grant kept changing during upsert"))
    }

    async fn delete_grant(
        &self,
        document_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, DocshareError> {
        let mut conn = self.connect().await?;
        let num = diesel::delete(schema::shared_documents::table)
            .filter(schema::shared_documents::document_id.eq(document_id))
            .filter(schema::shared_documents::user_id.eq(user_id))
            .execute(&mut conn)
            .await
            .map_err(internal_error)?;
        Ok(num != 0)
    }

    async fn grants_for(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<(SharedDocument, User)>, DocshareError> {
        let mut conn = self.connect().await?;
        schema::shared_documents::table
            .inner_join(schema::users::table)
            .filter(schema::shared_documents::document_id.eq(document_id))
            .order(schema::users::email.asc())
            .select((SharedDocument::as_select(), User::as_select()))
            .load(&mut conn)
            .await
            .map_err(internal_error)
    }
}

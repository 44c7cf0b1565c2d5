//! Member management service

use crate::{
    error::{AppError, AppResult},
    models::{
        member::{MemberInput, NewMember},
        Member,
    },
    repository::{BookInclude, BorrowingInclude, MemberInclude, Repository},
    services::{catalog::deleted_since_read, required_version},
    validation::validate,
};

#[derive(Clone)]
pub struct MembersService {
    repository: Repository,
}

impl MembersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// All members, by last then first name
    pub async fn list(&self) -> AppResult<Vec<Member>> {
        let mut members = self.repository.members_list(MemberInclude::NONE).await?;
        members.sort_by(|a, b| {
            (a.last_name.to_lowercase(), a.first_name.to_lowercase(), a.id).cmp(&(
                b.last_name.to_lowercase(),
                b.first_name.to_lowercase(),
                b.id,
            ))
        });
        Ok(members)
    }

    /// Member with their borrowings and the borrowed books
    pub async fn get(&self, id: i32) -> AppResult<Member> {
        self.repository
            .members_find(
                id,
                MemberInclude::with_borrowings(
                    BorrowingInclude::NONE.with_book(BookInclude::NONE.with_author()),
                ),
            )
            .await
    }

    pub async fn create(&self, input: MemberInput) -> AppResult<Member> {
        validate(&input).map_err(AppError::Validation)?;
        let email = input
            .email
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();

        let member = self
            .repository
            .insert_member(NewMember::from_input(input, email, None))
            .await?;
        tracing::info!("Member created: id={}", member.id);
        Ok(member)
    }

    /// Edit everything but the email, which stays as first recorded
    pub async fn update(&self, id: i32, mut input: MemberInput) -> AppResult<Member> {
        let version = required_version(input.version)?;
        let current = self
            .repository
            .members_find(id, MemberInclude::NONE)
            .await
            .map_err(deleted_since_read("Member", id))?;

        let email_changed = input
            .email
            .as_deref()
            .map(str::trim)
            .is_some_and(|email| !email.eq_ignore_ascii_case(&current.email));
        if email_changed {
            return Err(AppError::field("email", "The Email cannot be changed."));
        }
        input.email = Some(current.email.clone());
        validate(&input).map_err(AppError::Validation)?;

        let fields = NewMember::from_input(input, current.email, current.identity_id);
        let member = self
            .repository
            .update_member(&Member {
                id,
                first_name: fields.first_name,
                last_name: fields.last_name,
                address: fields.address,
                email: fields.email,
                phone: fields.phone,
                identity_id: fields.identity_id,
                version,
                borrowings: None,
            })
            .await?;
        tracing::info!("Member updated: id={} version={}", member.id, member.version);
        Ok(member)
    }

    /// Drops the member's borrowings along with them
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.delete_member(id).await?;
        tracing::info!("Member deleted: id={}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(phone: &str, email: Option<&str>, version: Option<i32>) -> MemberInput {
        MemberInput {
            first_name: "Ana".into(),
            last_name: "Pop".into(),
            address: Some("Str. Lalelelor 3".into()),
            email: email.map(str::to_string),
            phone: phone.into(),
            version,
        }
    }

    #[tokio::test]
    async fn phone_format_is_enforced() {
        let service = MembersService::new(Repository::in_memory());

        let member = service
            .create(input("0722-123-123", Some("ana.pop@example.com"), None))
            .await
            .unwrap();
        assert_eq!(member.full_name(), "Ana Pop");

        match service
            .create(input("0722123123", Some("ana.pop@example.com"), None))
            .await
        {
            Err(AppError::Validation(fields)) => {
                assert_eq!(fields.len(), 1);
                assert!(fields.contains_key("phone"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn email_cannot_change_on_edit() {
        let service = MembersService::new(Repository::in_memory());
        let member = service
            .create(input("0722-123-123", Some("ana.pop@example.com"), None))
            .await
            .unwrap();

        match service
            .update(
                member.id,
                input("0722-123-123", Some("ana@elsewhere.com"), Some(member.version)),
            )
            .await
        {
            Err(AppError::Validation(fields)) => {
                assert_eq!(fields["email"], "The Email cannot be changed.")
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        let updated = service
            .update(member.id, input("0744 555 666", None, Some(member.version)))
            .await
            .unwrap();
        assert_eq!(updated.email, "ana.pop@example.com");
        assert_eq!(updated.phone, "0744 555 666");
    }

    #[tokio::test]
    async fn details_load_empty_borrowings() {
        let service = MembersService::new(Repository::in_memory());
        let member = service
            .create(input("0722-123-123", Some("ana.pop@example.com"), None))
            .await
            .unwrap();

        let loaded = service.get(member.id).await.unwrap();
        assert_eq!(loaded.borrowings, Some(vec![]));
    }
}

use crate::db::error::DbError;
use crate::db::repo::account::{AccountRepo, NameField};
use crate::models::account::{Account, AccountView};
use crate::models::forms::{Credentials, PasswordChange, ProfileUpdate, Registration};
use crate::models::types::AccountId;
use crate::services::avatar::AvatarUploader;
use crate::services::credentials::CredentialVerifier;
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::session::{AccessToken, SessionIssuer};
use crate::services::validation::ValidationGateway;
use portico_core::{Input, Rule, RuleSet};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use url::Url;

const REGISTER_FAILED: &str = "There was a problem creating your account, please try again later.";
const UPDATE_FAILED: &str = "There was a problem updating profile, please try again later.";
const LOAD_FAILED: &str = "There was a problem loading profile, please try again later.";
const SEARCH_FAILED: &str = "There was a problem searching accounts, please try again later.";

/// Valid argon2id hash of a random secret. Unknown emails are verified against it so a failed login
/// costs the same whether or not the account exists.
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Account plus a freshly issued bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct Authenticated {
    pub user: Account,
    #[serde(rename = "accessToken")]
    pub access_token: AccessToken,
}

pub struct AccountService {
    validator: Arc<dyn ValidationGateway>,
    repo: Arc<dyn AccountRepo>,
    avatars: Arc<dyn AvatarUploader>,
    sessions: Arc<dyn SessionIssuer>,
    credentials: Arc<dyn CredentialVerifier>,
    app_url: Url,
}

/// Logs the underlying failure and replaces it with a generic client message.
fn storage_failure(message: &'static str, e: impl Display) -> ServiceError {
    error!(error = %e, "{message}");
    ServiceError::Persistence(message)
}

fn name_rules() -> [Rule; 2] {
    [Rule::Min(3), Rule::Max(50)]
}

fn password_rules() -> [Rule; 4] {
    [Rule::Required, Rule::Min(8), Rule::Max(50), Rule::Confirmed]
}

impl AccountService {
    pub fn new(
        validator: Arc<dyn ValidationGateway>,
        repo: Arc<dyn AccountRepo>,
        avatars: Arc<dyn AvatarUploader>,
        sessions: Arc<dyn SessionIssuer>,
        credentials: Arc<dyn CredentialVerifier>,
        app_url: Url,
    ) -> Self {
        Self { validator, repo, avatars, sessions, credentials, app_url }
    }

    async fn check(&self, rules: &RuleSet, input: &Input, failure: &'static str) -> ServiceResult<()> {
        let validation = self
            .validator
            .validate(rules, input)
            .await
            .map_err(|e| storage_failure(failure, e))?;

        if validation.fails() {
            return Err(ServiceError::Validation(validation.into_messages()));
        }
        Ok(())
    }

    /// Validates, stores the avatar, then writes the account. A failed upload leaves no row behind.
    #[instrument(skip_all)]
    pub async fn register(&self, form: Registration) -> ServiceResult<Authenticated> {
        let rules = RuleSet::new()
            .field("first_name", [Rule::Required, Rule::Min(3), Rule::Max(50)])
            .field("last_name", [Rule::Required, Rule::Min(3), Rule::Max(50)])
            .field("email", [Rule::Required, Rule::Email, Rule::Unique { ignore: None }])
            .field("password", password_rules())
            .field("photo", [Rule::Required, Rule::Image]);
        self.check(&rules, &form.input(), REGISTER_FAILED).await?;

        let Some(photo) = form.photo else {
            return Err(ServiceError::field("photo", "required"));
        };
        let first_name = form.first_name.unwrap_or_default();
        let photo_name = Account::photo_name(&first_name, photo.extension());

        if let Err(e) = self.avatars.store(&photo, &photo_name).await {
            warn!(kind = e.kind, message = %e.message, "avatar upload rejected");
            return Err(ServiceError::Upload(e));
        }

        let password_hash = self
            .credentials
            .hash(&form.password.unwrap_or_default())
            .map_err(|e| storage_failure(REGISTER_FAILED, e))?;

        let account = Account::new(
            first_name,
            form.last_name.unwrap_or_default(),
            form.email.unwrap_or_default(),
            password_hash,
            photo_name.clone(),
        );

        let account = match self.repo.insert_account(account).await {
            Ok(account) => account,
            Err(e) => {
                // no row refers to the file, so it must not stay behind
                self.avatars.remove(&photo_name).await;
                return Err(match e {
                    // lost a race with a concurrent registration of the same email
                    DbError::UniqueViolation => ServiceError::field("email", "unique"),
                    e => storage_failure(REGISTER_FAILED, e),
                });
            }
        };

        let access_token = self
            .sessions
            .generate(&account)
            .await
            .map_err(|e| storage_failure(REGISTER_FAILED, e))?;

        info!(account_id = %account.id, "account registered");
        Ok(Authenticated { user: account, access_token })
    }

    /// Checks email and password. Every failure after validation looks the same to the caller.
    #[instrument(skip_all)]
    pub async fn login(&self, form: Credentials) -> ServiceResult<Authenticated> {
        let rules = RuleSet::new()
            .field("email", [Rule::Required])
            .field("password", [Rule::Required]);
        self.check(&rules, &form.input(), LOAD_FAILED).await?;

        let email = form.email.unwrap_or_default();
        let password = form.password.unwrap_or_default();

        let account = match self.repo.get_by_email(&email).await {
            Ok(account) => account,
            Err(e) => {
                error!(error = %e, "account lookup failed during login");
                return Err(ServiceError::CredentialMismatch);
            }
        };

        let verified = match &account {
            Some(account) => self.credentials.verify(&password, &account.password_hash),
            None => {
                let _ = self.credentials.verify(&password, DUMMY_HASH);
                false
            }
        };

        let Some(account) = account.filter(|_| verified) else {
            warn!("login rejected");
            return Err(ServiceError::CredentialMismatch);
        };

        let access_token = match self.sessions.generate(&account).await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "token issuance failed");
                return Err(ServiceError::CredentialMismatch);
            }
        };

        info!(account_id = %account.id, "login");
        Ok(Authenticated { user: account, access_token })
    }

    async fn current(&self, identity: Option<AccountId>, failure: &'static str) -> ServiceResult<Account> {
        let Some(account_id) = identity else {
            return Err(ServiceError::Unauthorized);
        };
        self.repo
            .get_by_id(account_id)
            .await
            .map_err(|e| storage_failure(failure, e))?
            .ok_or(ServiceError::Unauthorized)
    }

    /// Applies the fields present in the request; absent or empty fields keep their value.
    #[instrument(skip_all)]
    pub async fn update_profile(&self, identity: Option<AccountId>, form: ProfileUpdate) -> ServiceResult<Account> {
        let mut account = self.current(identity, UPDATE_FAILED).await?;

        let rules = RuleSet::new()
            .field("first_name", name_rules())
            .field("last_name", name_rules())
            .field("email", [Rule::Email, Rule::Unique { ignore: Some(account.email.clone()) }]);
        self.check(&rules, &form.input(), UPDATE_FAILED).await?;

        let given = |v: Option<String>| v.filter(|v| !v.is_empty());
        if let Some(first_name) = given(form.first_name) {
            account.first_name = first_name;
        }
        if let Some(last_name) = given(form.last_name) {
            account.last_name = last_name;
        }
        if let Some(email) = given(form.email) {
            account.email = email;
        }

        match self.repo.update_profile(&account).await {
            Ok(account) => {
                info!(account_id = %account.id, "profile updated");
                Ok(account)
            }
            Err(DbError::UniqueViolation) => Err(ServiceError::field("email", "unique")),
            Err(e) => Err(storage_failure(UPDATE_FAILED, e)),
        }
    }

    /// Verifies the current password first; the new password is only looked at after that.
    #[instrument(skip_all)]
    pub async fn change_password(&self, identity: Option<AccountId>, form: PasswordChange) -> ServiceResult<()> {
        let account = self.current(identity, UPDATE_FAILED).await?;

        let current = form.password.as_deref().unwrap_or_default();
        if current.is_empty() || !self.credentials.verify(current, &account.password_hash) {
            warn!(account_id = %account.id, "current password not verified");
            return Err(ServiceError::CurrentPasswordMismatch);
        }

        let rules = RuleSet::new().field("new_password", password_rules());
        self.check(&rules, &form.input(), UPDATE_FAILED).await?;

        let password_hash = self
            .credentials
            .hash(&form.new_password.unwrap_or_default())
            .map_err(|e| storage_failure(UPDATE_FAILED, e))?;
        self.repo
            .update_password(account.id, &password_hash)
            .await
            .map_err(|e| storage_failure(UPDATE_FAILED, e))?;

        info!(account_id = %account.id, "password changed");
        Ok(())
    }

    /// First-name matches, then last-name matches, each account once. A blank query finds nothing.
    #[instrument(skip(self))]
    pub async fn search(&self, query: Option<&str>) -> ServiceResult<Vec<Account>> {
        let needle = query.map(str::trim).unwrap_or_default();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for field in [NameField::First, NameField::Last] {
            let matches = self
                .repo
                .search_name(field, needle)
                .await
                .map_err(|e| storage_failure(SEARCH_FAILED, e))?;
            found.extend(matches.into_iter().filter(|a| seen.insert(a.id)));
        }

        Ok(found)
    }

    /// The authenticated account with its photo URL and display name filled in.
    #[instrument(skip(self))]
    pub async fn profile(&self, identity: Option<AccountId>) -> ServiceResult<AccountView> {
        let Some(account_id) = identity else {
            return Err(ServiceError::NotFound);
        };

        let account = self
            .repo
            .get_by_id(account_id)
            .await
            .map_err(|e| storage_failure(LOAD_FAILED, e))?
            .ok_or(ServiceError::NotFound)?;

        Ok(account.view(&self.app_url))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repo::account_mem::MemoryAccountRepo;
    use crate::error::AppResult;
    use crate::models::forms::Upload;
    use crate::services::avatar::UploadError;
    use crate::services::credentials::Argon2Verifier;
    use crate::services::session::MemorySessions;
    use crate::services::validation::RuleValidator;
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use portico_core::{FieldMessage, Validation};
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ---------- fakes ----------

    /// Reversible "hash" so tests stay fast; only argon2 tests pay for the real thing.
    struct PlainVerifier;

    impl CredentialVerifier for PlainVerifier {
        fn hash(&self, raw: &str) -> AppResult<String> {
            Ok(format!("plain${raw}"))
        }

        fn verify(&self, raw: &str, hash: &str) -> bool {
            hash.strip_prefix("plain$") == Some(raw)
        }
    }

    #[derive(Default)]
    struct FakeUploader {
        stored: Mutex<Vec<String>>,
        removed: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl AvatarUploader for FakeUploader {
        async fn store(&self, upload: &Upload, name: &str) -> Result<(), UploadError> {
            if self.fail {
                return Err(UploadError {
                    field_name: upload.field_name.clone(),
                    client_name: upload.client_name.clone(),
                    message: "disk full".into(),
                    kind: "fs",
                });
            }
            self.stored.lock().push(name.to_string());
            Ok(())
        }

        async fn remove(&self, name: &str) {
            self.removed.lock().push(name.to_string());
        }
    }

    /// Runs the rules but answers every uniqueness check with "free", as a gateway that read
    /// before a concurrent write would.
    struct StaleValidator;

    #[async_trait]
    impl ValidationGateway for StaleValidator {
        async fn validate(&self, rules: &RuleSet, input: &Input) -> AppResult<Validation> {
            Ok(rules.evaluate(input).0)
        }
    }

    /// Counts calls before delegating to the real rule validator.
    struct CountingValidator {
        inner: RuleValidator,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ValidationGateway for CountingValidator {
        async fn validate(&self, rules: &RuleSet, input: &Input) -> AppResult<Validation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.validate(rules, input).await
        }
    }

    struct BrokenRepo;

    fn gone() -> DbError {
        DbError::Pool(deadpool_postgres::PoolError::Closed)
    }

    #[async_trait]
    impl AccountRepo for BrokenRepo {
        async fn get_by_id(&self, _: AccountId) -> crate::db::DbResult<Option<Account>> {
            Err(gone())
        }
        async fn get_by_email(&self, _: &str) -> crate::db::DbResult<Option<Account>> {
            Err(gone())
        }
        async fn email_exists(&self, _: &str) -> crate::db::DbResult<bool> {
            Ok(false)
        }
        async fn insert_account(&self, _: Account) -> crate::db::DbResult<Account> {
            Err(gone())
        }
        async fn update_profile(&self, _: &Account) -> crate::db::DbResult<Account> {
            Err(gone())
        }
        async fn update_password(&self, _: AccountId, _: &str) -> crate::db::DbResult<()> {
            Err(gone())
        }
        async fn search_name(&self, _: NameField, _: &str) -> crate::db::DbResult<Vec<Account>> {
            Err(gone())
        }
    }

    struct Harness {
        service: AccountService,
        repo: Arc<MemoryAccountRepo>,
        uploader: Arc<FakeUploader>,
        validator: Arc<CountingValidator>,
    }

    fn harness_with(uploader: FakeUploader, credentials: Arc<dyn CredentialVerifier>) -> Harness {
        let repo = Arc::new(MemoryAccountRepo::new());
        let uploader = Arc::new(uploader);
        let validator = Arc::new(CountingValidator {
            inner: RuleValidator::new(repo.clone()),
            calls: AtomicUsize::new(0),
        });
        let service = AccountService::new(
            validator.clone(),
            repo.clone(),
            uploader.clone(),
            Arc::new(MemorySessions::new(3600)),
            credentials,
            Url::parse("http://localhost:3333").unwrap(),
        );
        Harness { service, repo, uploader, validator }
    }

    fn harness() -> Harness {
        harness_with(FakeUploader::default(), Arc::new(PlainVerifier))
    }

    fn registration(first: &str, last: &str, email: &str) -> Registration {
        Registration {
            first_name: Some(first.into()),
            last_name: Some(last.into()),
            email: Some(email.into()),
            password: Some("s3cret-pass".into()),
            password_confirmation: Some("s3cret-pass".into()),
            photo: Some(Upload {
                field_name: "photo".into(),
                client_name: "portrait.jpeg".into(),
                content_type: Some("image/jpeg".into()),
                bytes: Bytes::from_static(b"\xff\xd8\xff"),
            }),
        }
    }

    async fn registered(h: &Harness, first: &str, last: &str, email: &str) -> Account {
        h.service.register(registration(first, last, email)).await.unwrap().user
    }

    fn messages(err: ServiceError) -> Vec<FieldMessage> {
        match err {
            ServiceError::Validation(m) => m,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    // ---------- registration ----------

    #[tokio::test]
    async fn register_stores_photo_then_account() {
        let h = harness();
        let auth = h.service.register(registration("Anna", "Lee", "anna@example.com")).await.unwrap();

        assert_eq!(auth.user.photo, "Anna.jpeg");
        assert_eq!(*h.uploader.stored.lock(), vec!["Anna.jpeg".to_string()]);
        assert_eq!(h.repo.len(), 1);
        assert_eq!(auth.access_token.kind, "bearer");
        // the raw password never reaches the store
        let stored = h.repo.get_by_email("anna@example.com").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "s3cret-pass");
    }

    #[tokio::test]
    async fn register_duplicate_email_fails_before_upload() {
        let h = harness();
        registered(&h, "Anna", "Lee", "anna@example.com").await;

        let err = h.service.register(registration("Other", "Person", "Anna@Example.com")).await.unwrap_err();

        assert_eq!(messages(err), vec![FieldMessage::new("email", "unique")]);
        assert_eq!(h.uploader.stored.lock().len(), 1);
        assert_eq!(h.repo.len(), 1);
    }

    #[tokio::test]
    async fn register_reports_every_bad_field() {
        let h = harness();
        let mut form = registration("Al", "Lee", "not-an-email");
        form.password_confirmation = Some("different".into());
        form.photo = None;

        let msgs = messages(h.service.register(form).await.unwrap_err());
        let fields: Vec<_> = msgs.iter().map(|m| (m.field.as_str(), m.validation)).collect();
        assert_eq!(
            fields,
            vec![("first_name", "min"), ("email", "email"), ("password", "confirmed"), ("photo", "required")]
        );
        assert!(h.uploader.stored.lock().is_empty());
        assert!(h.repo.is_empty());
    }

    #[tokio::test]
    async fn register_rejects_non_image_upload() {
        let h = harness();
        let mut form = registration("Anna", "Lee", "anna@example.com");
        if let Some(photo) = form.photo.as_mut() {
            photo.content_type = Some("application/pdf".into());
        }

        let msgs = messages(h.service.register(form).await.unwrap_err());
        assert_eq!(msgs, vec![FieldMessage::new("photo", "image")]);
        assert!(h.uploader.stored.lock().is_empty());
    }

    #[tokio::test]
    async fn register_failed_upload_creates_no_account() {
        let h = harness_with(FakeUploader { fail: true, ..Default::default() }, Arc::new(PlainVerifier));

        let err = h.service.register(registration("Anna", "Lee", "anna@example.com")).await.unwrap_err();

        match err {
            ServiceError::Upload(e) => {
                assert_eq!(e.kind, "fs");
                assert_eq!(e.client_name, "portrait.jpeg");
            }
            other => panic!("expected upload error, got {other:?}"),
        }
        assert!(h.repo.is_empty());
    }

    fn service_over(
        repo: Arc<dyn AccountRepo>,
        validator: Arc<dyn ValidationGateway>,
        uploader: Arc<FakeUploader>,
    ) -> AccountService {
        AccountService::new(
            validator,
            repo,
            uploader,
            Arc::new(MemorySessions::new(3600)),
            Arc::new(PlainVerifier),
            Url::parse("http://localhost:3333").unwrap(),
        )
    }

    #[tokio::test]
    async fn register_race_on_email_is_a_unique_message() {
        let repo = Arc::new(MemoryAccountRepo::new());
        repo.insert_account(Account::new("Anna", "Lee", "anna@example.com", "plain$x", "Anna.png"))
            .await
            .unwrap();
        let uploader = Arc::new(FakeUploader::default());
        let service = service_over(repo.clone(), Arc::new(StaleValidator), uploader.clone());

        let err = service.register(registration("Other", "Person", "anna@example.com")).await.unwrap_err();

        assert_eq!(messages(err), vec![FieldMessage::new("email", "unique")]);
        assert_eq!(repo.len(), 1);
        // the avatar written before the insert is taken back
        assert_eq!(*uploader.stored.lock(), vec!["Other.jpeg".to_string()]);
        assert_eq!(*uploader.removed.lock(), vec!["Other.jpeg".to_string()]);
    }

    #[tokio::test]
    async fn register_store_outage_removes_avatar() {
        let uploader = Arc::new(FakeUploader::default());
        let service = service_over(Arc::new(BrokenRepo), Arc::new(StaleValidator), uploader.clone());

        let err = service.register(registration("Anna", "Lee", "anna@example.com")).await.unwrap_err();

        assert!(matches!(err, ServiceError::Persistence(REGISTER_FAILED)));
        assert_eq!(*uploader.removed.lock(), vec!["Anna.jpeg".to_string()]);
    }

    // ---------- login ----------

    #[tokio::test]
    async fn login_issues_token_for_matching_credentials() {
        let h = harness();
        let anna = registered(&h, "Anna", "Lee", "anna@example.com").await;

        let auth = h
            .service
            .login(Credentials { email: Some("anna@example.com".into()), password: Some("s3cret-pass".into()) })
            .await
            .unwrap();

        assert_eq!(auth.user.id, anna.id);
        assert_eq!(auth.user.email, anna.email);
        assert!(!auth.access_token.token.is_empty());
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let h = harness();
        registered(&h, "Anna", "Lee", "anna@example.com").await;

        let wrong_password = h
            .service
            .login(Credentials { email: Some("anna@example.com".into()), password: Some("nope-nope".into()) })
            .await
            .unwrap_err();
        let unknown_email = h
            .service
            .login(Credentials { email: Some("ghost@example.com".into()), password: Some("s3cret-pass".into()) })
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, ServiceError::CredentialMismatch));
        assert!(matches!(unknown_email, ServiceError::CredentialMismatch));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let h = harness();
        let msgs = messages(h.service.login(Credentials::default()).await.unwrap_err());
        assert_eq!(msgs, vec![FieldMessage::new("email", "required"), FieldMessage::new("password", "required")]);
    }

    #[tokio::test]
    async fn login_store_failure_is_still_generic() {
        let service = AccountService::new(
            Arc::new(RuleValidator::new(Arc::new(BrokenRepo))),
            Arc::new(BrokenRepo),
            Arc::new(FakeUploader::default()),
            Arc::new(MemorySessions::new(3600)),
            Arc::new(PlainVerifier),
            Url::parse("http://localhost:3333").unwrap(),
        );

        let err = service
            .login(Credentials { email: Some("anna@example.com".into()), password: Some("whatever".into()) })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::CredentialMismatch));
    }

    // ---------- update profile ----------

    #[tokio::test]
    async fn update_with_own_email_is_not_a_conflict() {
        let h = harness();
        let anna = registered(&h, "Anna", "Lee", "anna@example.com").await;

        let updated = h
            .service
            .update_profile(
                Some(anna.id),
                ProfileUpdate { first_name: Some("Annabel".into()), email: Some("anna@example.com".into()), ..Default::default() },
            )
            .await
            .unwrap();

        assert_eq!(updated.first_name, "Annabel");
        assert_eq!(updated.email, "anna@example.com");
    }

    #[tokio::test]
    async fn update_to_another_accounts_email_fails() {
        let h = harness();
        let anna = registered(&h, "Anna", "Lee", "anna@example.com").await;
        registered(&h, "Joanna", "Smith", "jo@example.com").await;

        let err = h
            .service
            .update_profile(Some(anna.id), ProfileUpdate { email: Some("jo@example.com".into()), ..Default::default() })
            .await
            .unwrap_err();

        assert_eq!(messages(err), vec![FieldMessage::new("email", "unique")]);
        let stored = h.repo.get_by_id(anna.id).await.unwrap().unwrap();
        assert_eq!(stored.email, "anna@example.com");
    }

    #[tokio::test]
    async fn update_keeps_absent_fields() {
        let h = harness();
        let anna = registered(&h, "Anna", "Lee", "anna@example.com").await;

        let updated = h
            .service
            .update_profile(
                Some(anna.id),
                ProfileUpdate { last_name: Some("Leeson".into()), first_name: Some(String::new()), ..Default::default() },
            )
            .await
            .unwrap();

        assert_eq!(updated.first_name, "Anna");
        assert_eq!(updated.last_name, "Leeson");
        assert_eq!(updated.email, "anna@example.com");
    }

    #[tokio::test]
    async fn update_validates_name_length() {
        let h = harness();
        let anna = registered(&h, "Anna", "Lee", "anna@example.com").await;

        let err = h
            .service
            .update_profile(Some(anna.id), ProfileUpdate { last_name: Some("x".repeat(51)), ..Default::default() })
            .await
            .unwrap_err();
        assert_eq!(messages(err), vec![FieldMessage::new("last_name", "max")]);
    }

    #[tokio::test]
    async fn update_race_on_email_is_a_unique_message() {
        let h = harness();
        let anna = registered(&h, "Anna", "Lee", "anna@example.com").await;
        registered(&h, "Joanna", "Smith", "jo@example.com").await;
        let service = service_over(h.repo.clone(), Arc::new(StaleValidator), Arc::new(FakeUploader::default()));

        let err = service
            .update_profile(Some(anna.id), ProfileUpdate { email: Some("JO@example.com".into()), ..Default::default() })
            .await
            .unwrap_err();

        assert_eq!(messages(err), vec![FieldMessage::new("email", "unique")]);
        let stored = h.repo.get_by_id(anna.id).await.unwrap().unwrap();
        assert_eq!(stored.email, "anna@example.com");
    }

    #[tokio::test]
    async fn update_rejects_blank_name() {
        let h = harness();
        let anna = registered(&h, "Anna", "Lee", "anna@example.com").await;

        let err = h
            .service
            .update_profile(Some(anna.id), ProfileUpdate { first_name: Some("   ".into()), ..Default::default() })
            .await
            .unwrap_err();

        assert_eq!(messages(err), vec![FieldMessage::new("first_name", "min")]);
        let stored = h.repo.get_by_id(anna.id).await.unwrap().unwrap();
        assert_eq!(stored.first_name, "Anna");
    }

    #[tokio::test]
    async fn update_to_own_email_with_other_case_is_accepted() {
        let h = harness();
        let anna = registered(&h, "Anna", "Lee", "ÄNNA@example.com").await;

        let updated = h
            .service
            .update_profile(Some(anna.id), ProfileUpdate { email: Some("änna@example.com".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.email, "änna@example.com");
    }

    #[tokio::test]
    async fn update_without_identity_is_unauthorized() {
        let h = harness();
        let err = h.service.update_profile(None, ProfileUpdate::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized));
    }

    #[tokio::test]
    async fn update_store_failure_is_generic() {
        let h = harness();
        let anna = registered(&h, "Anna", "Lee", "anna@example.com").await;
        let broken = AccountService::new(
            Arc::new(RuleValidator::new(h.repo.clone())),
            Arc::new(BrokenRepo),
            Arc::new(FakeUploader::default()),
            Arc::new(MemorySessions::new(3600)),
            Arc::new(PlainVerifier),
            Url::parse("http://localhost:3333").unwrap(),
        );

        let err = broken.update_profile(Some(anna.id), ProfileUpdate::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Persistence(UPDATE_FAILED)));
        assert_eq!(err.to_string(), UPDATE_FAILED);
    }

    // ---------- change password ----------

    #[tokio::test]
    async fn wrong_current_password_skips_new_password_validation() {
        let h = harness();
        let anna = registered(&h, "Anna", "Lee", "anna@example.com").await;
        let calls_before = h.validator.calls.load(Ordering::SeqCst);

        let err = h
            .service
            .change_password(
                Some(anna.id),
                PasswordChange {
                    password: Some("wrong-password".into()),
                    // would fail every rule if it were looked at
                    new_password: Some("x".into()),
                    new_password_confirmation: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::CurrentPasswordMismatch));
        assert_eq!(h.validator.calls.load(Ordering::SeqCst), calls_before);
    }

    #[tokio::test]
    async fn missing_current_password_is_a_mismatch() {
        let h = harness();
        let anna = registered(&h, "Anna", "Lee", "anna@example.com").await;

        let err = h.service.change_password(Some(anna.id), PasswordChange::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::CurrentPasswordMismatch));
    }

    #[tokio::test]
    async fn new_password_is_validated_after_verification() {
        let h = harness();
        let anna = registered(&h, "Anna", "Lee", "anna@example.com").await;

        let err = h
            .service
            .change_password(
                Some(anna.id),
                PasswordChange {
                    password: Some("s3cret-pass".into()),
                    new_password: Some("short".into()),
                    new_password_confirmation: Some("short".into()),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(messages(err), vec![FieldMessage::new("new_password", "min")]);
    }

    #[tokio::test]
    async fn change_password_replaces_hash() {
        let h = harness_with(FakeUploader::default(), Arc::new(Argon2Verifier::new()));
        let anna = registered(&h, "Anna", "Lee", "anna@example.com").await;
        let argon = Argon2Verifier::new();

        h.service
            .change_password(
                Some(anna.id),
                PasswordChange {
                    password: Some("s3cret-pass".into()),
                    new_password: Some("brand-new-pass".into()),
                    new_password_confirmation: Some("brand-new-pass".into()),
                },
            )
            .await
            .unwrap();

        let stored = h.repo.get_by_id(anna.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, anna.password_hash);
        assert!(argon.verify("brand-new-pass", &stored.password_hash));
        assert!(!argon.verify("s3cret-pass", &stored.password_hash));
    }

    // ---------- search ----------

    #[tokio::test]
    async fn search_matches_first_or_last_name_case_insensitively() {
        let h = harness();
        registered(&h, "Anna", "Lee", "anna@example.com").await;
        registered(&h, "Joanna", "Smith", "jo@example.com").await;
        registered(&h, "Bob", "Brown", "bob@example.com").await;

        let names: Vec<_> = h
            .service
            .search(Some("ANN"))
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.first_name)
            .collect();
        assert_eq!(names, vec!["Anna", "Joanna"]);

        assert!(h.service.search(Some("zzz")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_lists_account_matching_both_names_once() {
        let h = harness();
        registered(&h, "Hannah", "Mann", "hannah@example.com").await;
        registered(&h, "Bob", "Annandale", "bob@example.com").await;

        let found = h.service.search(Some("ann")).await.unwrap();
        let names: Vec<_> = found.iter().map(|a| a.first_name.as_str()).collect();
        assert_eq!(names, vec!["Hannah", "Bob"]);
    }

    #[tokio::test]
    async fn blank_search_returns_nothing() {
        let h = harness();
        registered(&h, "Anna", "Lee", "anna@example.com").await;

        assert!(h.service.search(None).await.unwrap().is_empty());
        assert!(h.service.search(Some("   ")).await.unwrap().is_empty());
    }

    // ---------- profile ----------

    #[tokio::test]
    async fn profile_requires_identity() {
        let h = harness();
        assert!(matches!(h.service.profile(None).await, Err(ServiceError::NotFound)));
        assert!(matches!(h.service.profile(Some(AccountId::new())).await, Err(ServiceError::NotFound)));
    }

    #[tokio::test]
    async fn profile_has_photo_url_and_display_name() {
        let h = harness();
        let anna = registered(&h, "Anna Marie", "Lee", "anna@example.com").await;

        let view = h.service.profile(Some(anna.id)).await.unwrap();
        assert_eq!(view.photo, "http://localhost:3333/uploads/photos/Anna%20Marie.jpeg");
        assert_eq!(view.name, "Anna Marie Lee");

        // derived fields are not written back
        let stored = h.repo.get_by_id(anna.id).await.unwrap().unwrap();
        assert_eq!(stored.photo, "Anna Marie.jpeg");
    }

    #[test]
    fn dummy_hash_parses() {
        assert!(password_hash::PasswordHash::new(DUMMY_HASH).is_ok());
        assert!(!PlainVerifier.verify("x", DUMMY_HASH));
    }
}

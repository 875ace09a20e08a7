//! Fake backing systems for integration tests.
//!
//! One `FakeBackends` world implements both client traits so the identity
//! provider and the legacy API stay coherent (a password set through the
//! legacy reset call is the password the protocol checks). Every fake is
//! injected per test; there is no shared global fixture state.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use identity_gateway::{
    AnswerOutcome, ChallengeKind, ChallengeState, CredentialProvider, EmailKind,
    EnrollmentProfile, EnrollmentStarted, Group, IdentifyOutcome, IdpClient, IdpError,
    LegacyAccountApi, LegacyCredentials, LegacyError, LegacyProfile, LegacyStatus, LegacyUser,
    Mailer, MessagingError, ProfileUpdate, ProtocolHandle, RecoveryStarted, RecoveryTicket,
    Transaction, AuthenticatorSet,
};

#[derive(Clone)]
pub struct AccountRecord {
    pub id: String,
    pub email: String,
    pub status: LegacyStatus,
    pub password: Option<String>,
    pub email_verified: bool,
    pub provider: CredentialProvider,
    pub groups: Vec<String>,
    /// The protocol demands a credential reset after verification.
    pub force_reset: bool,
    /// Invisible to the legacy API until an enrollment conflict exposes it
    /// (models a record that beat our enrollment remotely).
    pub hidden: bool,
}

#[derive(Clone)]
struct Txn {
    email: Option<String>,
}

#[derive(Default)]
struct World {
    accounts: Vec<AccountRecord>,
    txns: HashMap<String, Txn>,
    tickets: HashMap<String, String>,
    passcodes: HashMap<String, String>,
    next_seq: u64,
    idp_failures_pending: u32,
    calls: Vec<String>,
}

impl World {
    fn next(&mut self, prefix: &str) -> String {
        self.next_seq += 1;
        format!("{prefix}-{}", self.next_seq)
    }

    fn account_by_email(&self, email: &str) -> Option<&AccountRecord> {
        self.accounts.iter().find(|a| a.email == email)
    }

    fn account_by_email_mut(&mut self, email: &str) -> Option<&mut AccountRecord> {
        self.accounts.iter_mut().find(|a| a.email == email)
    }

    fn account_by_identifier_mut(&mut self, identifier: &str) -> Option<&mut AccountRecord> {
        self.accounts
            .iter_mut()
            .find(|a| a.id == identifier || a.email == identifier)
    }

    fn fail_if_injected(&mut self) -> Result<(), IdpError> {
        if self.idp_failures_pending > 0 {
            self.idp_failures_pending -= 1;
            return Err(IdpError::Unavailable("injected outage".to_string()));
        }
        Ok(())
    }
}

fn to_legacy(record: &AccountRecord) -> LegacyUser {
    LegacyUser {
        id: record.id.clone(),
        status: record.status,
        profile: LegacyProfile {
            email: record.email.clone(),
            email_verified: record.email_verified,
        },
        credentials: LegacyCredentials {
            has_password: record.password.is_some(),
            provider: record.provider,
        },
    }
}

pub struct FakeBackends {
    state: Mutex<World>,
}

impl FakeBackends {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(World::default()),
        }
    }

    /// Register an account in both backing systems. Returns its id.
    pub fn add_account(
        &self,
        email: &str,
        status: LegacyStatus,
        password: Option<&str>,
        email_verified: bool,
    ) -> String {
        let mut world = self.state.lock().unwrap();
        let id = world.next("00u");
        world.accounts.push(AccountRecord {
            id: id.clone(),
            email: email.to_string(),
            status,
            password: password.map(str::to_string),
            email_verified,
            provider: CredentialProvider::Internal,
            groups: vec![],
            force_reset: false,
            hidden: false,
        });
        id
    }

    pub fn set_social(&self, email: &str) {
        let mut world = self.state.lock().unwrap();
        world.account_by_email_mut(email).unwrap().provider = CredentialProvider::Social;
    }

    pub fn add_group(&self, email: &str, group: &str) {
        let mut world = self.state.lock().unwrap();
        world
            .account_by_email_mut(email)
            .unwrap()
            .groups
            .push(group.to_string());
    }

    pub fn hide_until_conflict(&self, email: &str) {
        let mut world = self.state.lock().unwrap();
        world.account_by_email_mut(email).unwrap().hidden = true;
    }

    /// Make the next `n` identity-provider calls fail transiently.
    pub fn fail_next_idp_calls(&self, n: u32) {
        self.state.lock().unwrap().idp_failures_pending = n;
    }

    /// The currently valid passcode for this email, if one was issued.
    pub fn passcode_for(&self, email: &str) -> Option<String> {
        self.state.lock().unwrap().passcodes.get(email).cloned()
    }

    pub fn password_of(&self, email: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .account_by_email(email)
            .and_then(|a| a.password.clone())
    }

    pub fn email_verified(&self, email: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .account_by_email(email)
            .map(|a| a.email_verified)
            .unwrap_or(false)
    }

    /// Recorded legacy-API mutations, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl IdpClient for FakeBackends {
    async fn interact(&self) -> Result<Transaction, IdpError> {
        let mut world = self.state.lock().unwrap();
        world.fail_if_injected()?;
        let handle = world.next("txn");
        world.txns.insert(handle.clone(), Txn { email: None });
        Ok(Transaction {
            handle: ProtocolHandle::new(handle),
            expires_at: Utc::now() + Duration::minutes(15),
        })
    }

    async fn introspect(&self, handle: &ProtocolHandle) -> Result<Transaction, IdpError> {
        let mut world = self.state.lock().unwrap();
        world.fail_if_injected()?;
        if !world.txns.contains_key(handle.as_str()) {
            return Err(IdpError::InvalidToken);
        }
        Ok(Transaction {
            handle: handle.clone(),
            expires_at: Utc::now() + Duration::minutes(15),
        })
    }

    async fn identify(
        &self,
        handle: &ProtocolHandle,
        identifier: &str,
    ) -> Result<IdentifyOutcome, IdpError> {
        let mut world = self.state.lock().unwrap();
        world.fail_if_injected()?;
        if !world.txns.contains_key(handle.as_str()) {
            return Err(IdpError::InvalidToken);
        }
        let Some(account) = world.account_by_email(identifier).cloned() else {
            return Err(IdpError::Protocol("identify for unknown identifier".to_string()));
        };
        let next = world.next("txn");
        world.txns.insert(
            next.clone(),
            Txn {
                email: Some(account.email.clone()),
            },
        );
        Ok(IdentifyOutcome {
            handle: ProtocolHandle::new(next),
            authenticators: AuthenticatorSet {
                email: true,
                password: account.password.is_some(),
            },
        })
    }

    async fn challenge(
        &self,
        handle: &ProtocolHandle,
        kind: ChallengeKind,
    ) -> Result<ChallengeState, IdpError> {
        let mut world = self.state.lock().unwrap();
        world.fail_if_injected()?;
        let Some(txn) = world.txns.get(handle.as_str()).cloned() else {
            return Err(IdpError::InvalidToken);
        };
        let email = txn
            .email
            .clone()
            .ok_or_else(|| IdpError::Protocol("challenge before identify".to_string()))?;

        if kind == ChallengeKind::EmailPasscode {
            let code = world.next("code");
            world.passcodes.insert(email.clone(), code);
        }

        let next = world.next("txn");
        world.txns.insert(next.clone(), Txn { email: Some(email) });
        Ok(ChallengeState {
            handle: ProtocolHandle::new(next),
            kind,
            expires_at: Utc::now() + Duration::minutes(5),
        })
    }

    async fn answer(
        &self,
        handle: &ProtocolHandle,
        kind: ChallengeKind,
        answer: &str,
    ) -> Result<AnswerOutcome, IdpError> {
        let mut world = self.state.lock().unwrap();
        world.fail_if_injected()?;
        let Some(txn) = world.txns.get(handle.as_str()).cloned() else {
            return Err(IdpError::InvalidToken);
        };
        let email = txn
            .email
            .ok_or_else(|| IdpError::Protocol("answer before identify".to_string()))?;

        let correct = match kind {
            ChallengeKind::Password => world
                .account_by_email(&email)
                .and_then(|a| a.password.as_deref())
                .map(|p| p == answer)
                .unwrap_or(false),
            ChallengeKind::EmailPasscode => world
                .passcodes
                .get(&email)
                .map(|c| c == answer)
                .unwrap_or(false),
        };
        if !correct {
            return Err(IdpError::InvalidCredential);
        }

        if kind == ChallengeKind::EmailPasscode {
            world.passcodes.remove(&email);
        }

        let force_reset = world
            .account_by_email(&email)
            .map(|a| a.force_reset)
            .unwrap_or(false);
        if force_reset {
            let next = world.next("txn");
            world.txns.insert(
                next.clone(),
                Txn {
                    email: Some(email),
                },
            );
            return Ok(AnswerOutcome::ResetRequired {
                handle: ProtocolHandle::new(next),
            });
        }

        Ok(AnswerOutcome::Complete {
            session_token: format!("provider-session-{email}"),
        })
    }

    async fn enroll(
        &self,
        handle: &ProtocolHandle,
        profile: &EnrollmentProfile,
    ) -> Result<EnrollmentStarted, IdpError> {
        let mut world = self.state.lock().unwrap();
        world.fail_if_injected()?;
        if !world.txns.contains_key(handle.as_str()) {
            return Err(IdpError::InvalidToken);
        }

        if let Some(existing) = world.account_by_email_mut(&profile.email) {
            // The record surfaces now, whether it was visible before or
            // raced our enrollment.
            existing.hidden = false;
            return Err(IdpError::Conflict("identifier exists".to_string()));
        }

        let id = world.next("00u");
        world.accounts.push(AccountRecord {
            id,
            email: profile.email.clone(),
            status: LegacyStatus::Active,
            password: None,
            email_verified: true,
            provider: CredentialProvider::Internal,
            groups: vec![],
            force_reset: false,
            hidden: false,
        });

        let next = world.next("txn");
        world.txns.insert(
            next.clone(),
            Txn {
                email: Some(profile.email.clone()),
            },
        );
        Ok(EnrollmentStarted {
            handle: ProtocolHandle::new(next),
            expires_at: Utc::now() + Duration::minutes(15),
        })
    }

    async fn recover(&self, handle: &ProtocolHandle) -> Result<RecoveryStarted, IdpError> {
        let mut world = self.state.lock().unwrap();
        world.fail_if_injected()?;
        let Some(txn) = world.txns.get(handle.as_str()).cloned() else {
            return Err(IdpError::InvalidToken);
        };
        let next = world.next("txn");
        world.txns.insert(next.clone(), Txn { email: txn.email });
        Ok(RecoveryStarted {
            handle: ProtocolHandle::new(next),
            expires_at: Utc::now() + Duration::minutes(15),
        })
    }

    async fn reset_credential(
        &self,
        handle: &ProtocolHandle,
        new_password: &str,
    ) -> Result<AnswerOutcome, IdpError> {
        let mut world = self.state.lock().unwrap();
        world.fail_if_injected()?;
        let Some(txn) = world.txns.get(handle.as_str()).cloned() else {
            return Err(IdpError::InvalidToken);
        };
        let email = txn
            .email
            .ok_or_else(|| IdpError::Protocol("reset before identify".to_string()))?;

        let account = world
            .account_by_email_mut(&email)
            .ok_or_else(|| IdpError::Protocol("reset for unknown account".to_string()))?;
        account.password = Some(new_password.to_string());
        account.force_reset = false;
        account.status = LegacyStatus::Active;

        Ok(AnswerOutcome::Complete {
            session_token: format!("provider-session-{email}"),
        })
    }
}

#[async_trait]
impl LegacyAccountApi for FakeBackends {
    async fn get_user(&self, identifier: &str) -> Result<Option<LegacyUser>, LegacyError> {
        let world = self.state.lock().unwrap();
        Ok(world
            .accounts
            .iter()
            .find(|a| (a.id == identifier || a.email == identifier) && !a.hidden)
            .map(to_legacy))
    }

    async fn update_user(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<LegacyUser, LegacyError> {
        let mut world = self.state.lock().unwrap();
        world.calls.push(format!("update_user:{user_id}"));
        let account = world
            .account_by_identifier_mut(user_id)
            .ok_or(LegacyError::NotFound)?;
        if let Some(verified) = update.email_verified {
            account.email_verified = verified;
        }
        let view = to_legacy(account);
        Ok(view)
    }

    async fn forgot_password(&self, user_id: &str) -> Result<RecoveryTicket, LegacyError> {
        let mut world = self.state.lock().unwrap();
        world.calls.push(format!("forgot_password:{user_id}"));
        let account = world
            .account_by_identifier_mut(user_id)
            .ok_or(LegacyError::NotFound)?;
        let (account_id, _email) = (account.id.clone(), account.email.clone());
        let token = world.next("ticket");
        world.tickets.insert(token.clone(), account_id.clone());
        Ok(RecoveryTicket {
            user_id: account_id,
            token,
            expires_at: Utc::now() + Duration::hours(1),
        })
    }

    async fn reset_password(
        &self,
        user_id: &str,
        token: &str,
        new_password: &str,
    ) -> Result<(), LegacyError> {
        let mut world = self.state.lock().unwrap();
        world.calls.push(format!("reset_password:{user_id}"));
        match world.tickets.get(token) {
            Some(owner) if owner == user_id => {}
            _ => return Err(LegacyError::InvalidToken),
        }
        world.tickets.remove(token);
        let account = world
            .account_by_identifier_mut(user_id)
            .ok_or(LegacyError::NotFound)?;
        account.password = Some(new_password.to_string());
        Ok(())
    }

    async fn validate_recovery_token(&self, token: &str) -> Result<RecoveryTicket, LegacyError> {
        let mut world = self.state.lock().unwrap();
        world.calls.push(format!("validate_recovery_token:{token}"));
        let owner = world
            .tickets
            .get(token)
            .cloned()
            .ok_or(LegacyError::InvalidToken)?;
        Ok(RecoveryTicket {
            user_id: owner,
            token: token.to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        })
    }

    async fn get_user_groups(&self, user_id: &str) -> Result<Vec<Group>, LegacyError> {
        let mut world = self.state.lock().unwrap();
        let account = world
            .account_by_identifier_mut(user_id)
            .ok_or(LegacyError::NotFound)?;
        Ok(account
            .groups
            .iter()
            .enumerate()
            .map(|(i, name)| Group {
                id: format!("g{i}"),
                name: name.clone(),
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub kind: EmailKind,
    pub token: String,
}

#[derive(Default)]
pub struct FakeMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl FakeMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<SentMail> {
        self.sent.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, to: &str, kind: EmailKind, token: &str) -> Result<(), MessagingError> {
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            kind,
            token: token.to_string(),
        });
        Ok(())
    }
}

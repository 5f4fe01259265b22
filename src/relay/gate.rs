//! Recipient admission by domain

use log::warn;

use crate::relay::Role;
use crate::relay::error::RelayError;
use crate::relay::transaction::MailTransaction;

/// Admits recipients into a transaction. In server role only addresses in the
/// shielded domain get through; in relay role everything does.
#[derive(Debug, Clone)]
pub struct DomainGate {
    role: Role,
    domain: String,
}

impl DomainGate {
    pub fn new(role: Role, domain: &str) -> Self {
        Self {
            role,
            domain: domain.to_ascii_lowercase(),
        }
    }

    pub fn admit(
        &self,
        transaction: &mut MailTransaction,
        recipient: String,
    ) -> Result<(), RelayError> {
        if self.role == Role::Server && !recipient.to_ascii_lowercase().contains(&self.domain) {
            warn!("notme >>> {recipient}");
            return Err(RelayError::DomainMismatch { address: recipient });
        }

        transaction.admit(recipient);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::TransactionState;

    fn transaction() -> MailTransaction {
        let mut transaction = MailTransaction::new();
        transaction.set_sender("someone@outside.example".to_string());
        transaction
    }

    #[test]
    fn test_server_admits_shielded_domain() {
        let gate = DomainGate::new(Role::Server, "shielded.example");
        let mut transaction = transaction();

        gate.admit(&mut transaction, "x@shielded.example".to_string())
            .unwrap();
        assert_eq!(transaction.recipients, vec!["x@shielded.example"]);
        assert_eq!(transaction.state, TransactionState::RecipientsAdmitted);
    }

    #[test]
    fn test_server_rejects_foreign_domain() {
        let gate = DomainGate::new(Role::Server, "shielded.example");
        let mut transaction = transaction();

        let result = gate.admit(&mut transaction, "x@evil.example".to_string());
        assert!(matches!(result, Err(RelayError::DomainMismatch { .. })));
        assert!(transaction.recipients.is_empty());
        assert_eq!(transaction.state, TransactionState::SenderKnown);
    }

    #[test]
    fn test_rejection_keeps_earlier_recipients() {
        let gate = DomainGate::new(Role::Server, "shielded.example");
        let mut transaction = transaction();

        gate.admit(&mut transaction, "x@shielded.example".to_string())
            .unwrap();
        assert!(
            gate.admit(&mut transaction, "y@evil.example".to_string())
                .is_err()
        );
        assert_eq!(transaction.recipients, vec!["x@shielded.example"]);
        assert_eq!(transaction.state, TransactionState::RecipientsAdmitted);
    }

    #[test]
    fn test_relay_admits_anything() {
        let gate = DomainGate::new(Role::Relay, "shielded.example");
        let mut transaction = transaction();

        gate.admit(&mut transaction, "x@evil.example".to_string())
            .unwrap();
        assert_eq!(transaction.recipients, vec!["x@evil.example"]);
    }
}

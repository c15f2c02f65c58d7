//! The entry point for callers: every ledger operation on behalf of a session.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use time::Duration;

use crate::{
    Error,
    balance::{Balances, aggregate_balances, get_pairwise_totals},
    db::now_utc,
    id::{IdGenerator, RandomIdGenerator},
    ledger::{self, ExpenseId, LedgerEntry, NewExpense, create_expense, soft_delete_expense},
    member::MemberId,
    session::{SessionResolver, SqliteSessionResolver, create_session, delete_session},
    split::SplitRequest,
};

/// Records, deletes and reads expenses for the member behind a session token.
///
/// Each call resolves the token first and only acts on the caller's own group. Nothing is
/// cached between calls, so a `Ledger` can be shared freely between threads.
#[derive(Clone)]
pub struct Ledger {
    connection: Arc<Mutex<Connection>>,
    id_generator: Arc<dyn IdGenerator>,
    session_resolver: Arc<dyn SessionResolver>,
}

impl Ledger {
    /// Create a ledger from its collaborators.
    pub fn new(
        connection: Arc<Mutex<Connection>>,
        id_generator: Arc<dyn IdGenerator>,
        session_resolver: Arc<dyn SessionResolver>,
    ) -> Self {
        Self {
            connection,
            id_generator,
            session_resolver,
        }
    }

    /// Create a ledger that reads sessions from the same database and generates random IDs.
    pub fn open(connection: Arc<Mutex<Connection>>) -> Self {
        let session_resolver = Arc::new(SqliteSessionResolver::new(connection.clone()));

        Self::new(
            connection,
            Arc::new(RandomIdGenerator::default()),
            session_resolver,
        )
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)
    }

    /// Log `member_id` in for `duration`, returning the new session token.
    ///
    /// # Errors
    ///
    /// Returns [Error::NotFound] if the member does not exist, or a persistence error.
    pub fn log_in(&self, member_id: MemberId, duration: Duration) -> Result<String, Error> {
        create_session(member_id, duration, self.id_generator.as_ref(), &*self.lock()?)
    }

    /// End the session `token`.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidSession] if there is no such session, or a persistence error.
    pub fn log_out(&self, token: &str) -> Result<(), Error> {
        delete_session(token, &*self.lock()?)
    }

    /// Split an expense across the caller's group and record it with its transfers.
    ///
    /// Missing owed percentages and currency are taken from the group's defaults. The request
    /// is then validated against the group's roster, stopping at the first failed check.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidSession] for a bad token, the first validation error, or a
    /// persistence error. Nothing is written when an error is returned.
    pub fn record_expense(&self, token: &str, request: SplitRequest) -> Result<LedgerEntry, Error> {
        let context = self.session_resolver.resolve(token)?;

        let split = request
            .with_group_defaults(&context.group.metadata)
            .validate(&context.group.member_ids)
            .inspect_err(|error| {
                tracing::debug!("rejected split from member {}: {error}", context.member.id)
            })?;

        let new_expense = NewExpense::new(context.group.id, split, now_utc());

        create_expense(new_expense, self.id_generator.as_ref(), &*self.lock()?)
    }

    /// Delete the expense `expense_id` and its transfers from the caller's group.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidSession] for a bad token, [Error::DeleteMissingExpense] if the
    /// expense does not exist or is already deleted, [Error::ExpenseNotInGroup] if it belongs
    /// to another group, or a persistence error.
    pub fn delete_expense(&self, token: &str, expense_id: ExpenseId) -> Result<(), Error> {
        let context = self.session_resolver.resolve(token)?;

        soft_delete_expense(expense_id, context.group.id, now_utc(), &*self.lock()?)
    }

    /// The caller's net balance with every other member of their group, per currency.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidSession] for a bad token, or a persistence error.
    pub fn balances(&self, token: &str) -> Result<Balances, Error> {
        let context = self.session_resolver.resolve(token)?;
        let totals = get_pairwise_totals(context.group.id, &*self.lock()?)?;

        Ok(aggregate_balances(
            context.member.id,
            &context.roster,
            &totals,
        ))
    }

    /// A page of the live expenses in the caller's group, newest first.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidSession] for a bad token, or a persistence error.
    pub fn list_expenses(&self, token: &str, offset: u64) -> Result<Vec<LedgerEntry>, Error> {
        let context = self.session_resolver.resolve(token)?;

        ledger::list_expenses(context.group.id, offset, &*self.lock()?)
    }
}

#[cfg(test)]
mod ledger_tests {
    use std::{
        collections::BTreeMap,
        sync::{Arc, Mutex},
    };

    use rusqlite::Connection;

    use crate::{
        Currency, Error, ErrorKind,
        db::initialize,
        group::{GroupMetadata, create_group},
        id::SequentialIdGenerator,
        member::{Member, create_member},
        service::Ledger,
        session::{DEFAULT_SESSION_DURATION, SqliteSessionResolver},
        split::SplitRequest,
    };

    struct Fixture {
        ledger: Ledger,
        alice: Member,
        bob: Member,
        alice_token: String,
        bob_token: String,
    }

    fn get_fixture() -> Fixture {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let mut metadata = GroupMetadata::new(Currency::USD);
        let group = create_group(&[], &metadata, &connection).unwrap();
        let alice = create_member("Alice", group.id, &connection).unwrap();
        let bob = create_member("Bob", group.id, &connection).unwrap();
        metadata.default_share_percentages = BTreeMap::from([(alice.id, 50.0), (bob.id, 50.0)]);
        crate::group::update_group_metadata(group.id, &metadata, &connection).unwrap();

        let connection = Arc::new(Mutex::new(connection));
        let ledger = Ledger::new(
            connection.clone(),
            Arc::new(SequentialIdGenerator::new("id")),
            Arc::new(SqliteSessionResolver::new(connection)),
        );
        let alice_token = ledger.log_in(alice.id, DEFAULT_SESSION_DURATION).unwrap();
        let bob_token = ledger.log_in(bob.id, DEFAULT_SESSION_DURATION).unwrap();

        Fixture {
            ledger,
            alice,
            bob,
            alice_token,
            bob_token,
        }
    }

    fn paid_by(member: &Member, amount: f64) -> SplitRequest {
        SplitRequest {
            amount,
            description: "Groceries".to_owned(),
            currency: String::new(),
            paid_shares: BTreeMap::from([(member.id, amount)]),
            owed_percentages: BTreeMap::new(),
        }
    }

    #[test]
    fn record_then_read_balances() {
        let fixture = get_fixture();
        fixture
            .ledger
            .record_expense(&fixture.alice_token, paid_by(&fixture.alice, 100.0))
            .unwrap();
        fixture
            .ledger
            .record_expense(&fixture.bob_token, paid_by(&fixture.bob, 40.0))
            .unwrap();

        let for_alice = fixture.ledger.balances(&fixture.alice_token).unwrap();
        let for_bob = fixture.ledger.balances(&fixture.bob_token).unwrap();

        assert_eq!(for_alice["Bob"][&Currency::USD], 30.0);
        assert_eq!(for_bob["Alice"][&Currency::USD], -30.0);
    }

    #[test]
    fn group_defaults_fill_in_currency_and_shares() {
        let fixture = get_fixture();

        let entry = fixture
            .ledger
            .record_expense(&fixture.alice_token, paid_by(&fixture.alice, 10.0))
            .unwrap();

        assert_eq!(entry.expense.currency, Currency::USD);
        assert_eq!(entry.expense.metadata.owed_percentages[&fixture.bob.id], 50.0);
        assert_eq!(entry.transfers.len(), 1);
    }

    #[test]
    fn first_validation_error_is_returned() {
        let fixture = get_fixture();
        let mut request = paid_by(&fixture.alice, 0.0);
        request.description = String::new();

        let result = fixture.ledger.record_expense(&fixture.alice_token, request);

        assert_eq!(result, Err(Error::InvalidAmount));
        assert_eq!(
            fixture.ledger.list_expenses(&fixture.alice_token, 0).unwrap(),
            vec![]
        );
    }

    #[test]
    fn percentages_short_of_100_are_rejected_without_writes() {
        let fixture = get_fixture();
        let mut request = paid_by(&fixture.alice, 100.0);
        request.owed_percentages =
            BTreeMap::from([(fixture.alice.id, 50.0), (fixture.bob.id, 49.0)]);

        let result = fixture.ledger.record_expense(&fixture.alice_token, request);

        assert_eq!(result, Err(Error::InvalidSplitPercentages));
        assert!(
            fixture
                .ledger
                .list_expenses(&fixture.alice_token, 0)
                .unwrap()
                .is_empty()
        );
        assert!(fixture.ledger.balances(&fixture.bob_token).unwrap().is_empty());
    }

    #[test]
    fn bad_token_is_rejected_before_anything_else() {
        let fixture = get_fixture();

        let result = fixture
            .ledger
            .record_expense("not a token", paid_by(&fixture.alice, 0.0));

        assert_eq!(result, Err(Error::InvalidSession));
        assert_eq!(
            result.unwrap_err().kind(),
            ErrorKind::Authorization
        );
    }

    #[test]
    fn delete_removes_expense_from_balances_and_listing() {
        let fixture = get_fixture();
        let entry = fixture
            .ledger
            .record_expense(&fixture.alice_token, paid_by(&fixture.alice, 100.0))
            .unwrap();

        fixture
            .ledger
            .delete_expense(&fixture.bob_token, entry.expense.id)
            .unwrap();

        assert!(fixture.ledger.balances(&fixture.alice_token).unwrap().is_empty());
        assert!(
            fixture
                .ledger
                .list_expenses(&fixture.alice_token, 0)
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            fixture
                .ledger
                .delete_expense(&fixture.bob_token, entry.expense.id),
            Err(Error::DeleteMissingExpense)
        );
    }

    #[test]
    fn logged_out_session_cannot_read() {
        let fixture = get_fixture();

        fixture.ledger.log_out(&fixture.alice_token).unwrap();

        assert_eq!(
            fixture.ledger.balances(&fixture.alice_token),
            Err(Error::InvalidSession)
        );
        assert!(fixture.ledger.balances(&fixture.bob_token).is_ok());
    }
}

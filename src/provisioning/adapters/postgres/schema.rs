//! Diesel schema for provisioning persistence.

diesel::table! {
    /// Companies eligible for agent provisioning.
    companies (id) {
        /// Company identifier.
        id -> Int8,
        /// Display name.
        #[max_length = 255]
        name -> Varchar,
        /// Number attached by a completed provisioning run.
        #[max_length = 16]
        telephony_number -> Nullable<Varchar>,
    }
}

diesel::table! {
    /// Provisioned agent records.
    agents (id) {
        /// Directory-assigned identifier.
        id -> Int8,
        /// Owning company.
        company_id -> Int8,
        /// Agent type storage name.
        #[max_length = 50]
        agent_type -> Varchar,
        /// Remote agent configuration identifier.
        #[max_length = 255]
        provider_agent_id -> Varchar,
        /// Number attached to the agent.
        #[max_length = 16]
        telephony_number -> Varchar,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Per-company provisioning leases.
    company_leases (company_id) {
        /// Leased company.
        company_id -> Int8,
        /// Run holding the lease.
        holder -> Uuid,
        /// Acquisition timestamp.
        acquired_at -> Timestamptz,
        /// Expiry timestamp.
        expires_at -> Timestamptz,
    }
}

diesel::table! {
    /// Resources awaiting operator reconciliation.
    orphaned_resources (id) {
        /// Ledger entry identifier.
        id -> Uuid,
        /// Run that acquired the resource.
        run_id -> Uuid,
        /// Company the resource was acquired for.
        company_id -> Int8,
        /// Orphan kind storage name.
        #[max_length = 50]
        kind -> Varchar,
        /// External reference of the resource.
        #[max_length = 255]
        reference -> Varchar,
        /// Why the resource could not be undone.
        reason -> Text,
        /// When the orphan was recorded.
        recorded_at -> Timestamptz,
        /// When an operator reconciled the orphan.
        resolved_at -> Nullable<Timestamptz>,
    }
}

diesel::joinable!(agents -> companies (company_id));
diesel::allow_tables_to_appear_in_same_query!(agents, companies);

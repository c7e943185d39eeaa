//! Role and knowledge-area catalog.
//!
//! The original tool kept its role/topic checklists as module-level mutable
//! globals; here they are immutable data built once at startup and passed
//! explicitly into the services that need them.

use handover_schema::AreaKey;

/// Display metadata for one of the eight knowledge areas.
#[derive(Debug, Clone, Copy)]
pub struct AreaInfo {
    pub key: AreaKey,
    pub name: &'static str,
    pub prompt: &'static str,
}

pub const KNOWLEDGE_AREAS: [AreaInfo; 8] = [
    AreaInfo {
        key: AreaKey::Overview,
        name: "Overview",
        prompt: "What is this and why does it matter?",
    },
    AreaInfo {
        key: AreaKey::Tasks,
        name: "Key Tasks",
        prompt: "What are the step-by-step actions?",
    },
    AreaInfo {
        key: AreaKey::Dates,
        name: "Key Dates",
        prompt: "What are the deadlines and triggers?",
    },
    AreaInfo {
        key: AreaKey::Contacts,
        name: "Contacts",
        prompt: "Who do you need to work with?",
    },
    AreaInfo {
        key: AreaKey::Systems,
        name: "Systems & Tools",
        prompt: "What software/templates are used?",
    },
    AreaInfo {
        key: AreaKey::Pitfalls,
        name: "Watch Out For",
        prompt: "What are common mistakes or pitfalls?",
    },
    AreaInfo {
        key: AreaKey::Tips,
        name: "Pro Tips",
        prompt: "What insider knowledge would help a successor?",
    },
    AreaInfo {
        key: AreaKey::Related,
        name: "Related Topics",
        prompt: "What other areas does this connect to?",
    },
];

pub fn area_info(key: AreaKey) -> &'static AreaInfo {
    KNOWLEDGE_AREAS
        .iter()
        .find(|a| a.key == key)
        .expect("every AreaKey has catalog metadata")
}

/// A structured topic an interviewer should cover for a role.
#[derive(Debug, Clone)]
pub struct ChecklistTopic {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub is_process_oriented: bool,
    pub required_areas: &'static [AreaKey],
}

/// One interviewable role with its domain framing and topic checklist.
#[derive(Debug, Clone)]
pub struct RoleProfile {
    pub name: &'static str,
    pub description: &'static str,
    pub domain: &'static str,
    pub key_areas: &'static [&'static str],
    pub topics: Vec<ChecklistTopic>,
}

/// Immutable catalog of interviewable roles, constructed at startup.
#[derive(Debug, Clone)]
pub struct RoleCatalog {
    roles: Vec<RoleProfile>,
}

impl RoleCatalog {
    pub fn builtin() -> Self {
        Self {
            roles: builtin_roles(),
        }
    }

    pub fn role(&self, name: &str) -> Option<&RoleProfile> {
        self.roles.iter().find(|r| r.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.role(name).is_some()
    }

    pub fn roles(&self) -> &[RoleProfile] {
        &self.roles
    }

    pub fn role_names(&self) -> Vec<&'static str> {
        self.roles.iter().map(|r| r.name).collect()
    }

    /// Directory slug used for scenario storage ("Head of AP" → "head-of-ap").
    pub fn slug(name: &str) -> String {
        name.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-")
    }
}

use AreaKey::*;

fn builtin_roles() -> Vec<RoleProfile> {
    vec![
        RoleProfile {
            name: "Finance Director",
            description: "Strategic financial leadership for the local authority",
            domain: "Strategic financial leadership, budgeting, reserves, MTFS, political considerations, savings programs",
            key_areas: &[
                "Medium Term Financial Strategy (MTFS) development and monitoring",
                "Budget setting and monitoring processes",
                "Reserves strategy and adequacy assessment",
                "Savings programs and efficiency initiatives",
                "Political and member engagement on financial matters",
                "Section 151 officer responsibilities and risk management",
                "Financial reporting to council and scrutiny",
                "Treasury management strategy oversight",
                "Capital program planning and financing",
            ],
            topics: vec![
                ChecklistTopic {
                    id: "mtfs-development",
                    name: "MTFS Development & Planning",
                    description: "Medium Term Financial Strategy creation, updates, and political approval process",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Dates, Contacts, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "budget-setting",
                    name: "Annual Budget Setting",
                    description: "The annual budget cycle from planning through Council approval",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Dates, Contacts, Systems, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "budget-monitoring",
                    name: "In-Year Budget Monitoring",
                    description: "Monthly/quarterly monitoring, variance analysis, and reporting to members",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Dates, Contacts, Systems, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "reserves-strategy",
                    name: "Reserves & Balances Strategy",
                    description: "Assessing reserves adequacy, earmarked reserves, and risk assessment",
                    is_process_oriented: false,
                    required_areas: &[Overview, Tasks, Contacts, Pitfalls, Tips, Related],
                },
                ChecklistTopic {
                    id: "savings-programmes",
                    name: "Savings & Efficiency Programmes",
                    description: "Identifying, tracking, and delivering savings across the authority",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Dates, Contacts, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "member-engagement",
                    name: "Political & Member Engagement",
                    description: "Working with Cabinet, Scrutiny, and Council on financial matters",
                    is_process_oriented: false,
                    required_areas: &[Overview, Contacts, Pitfalls, Tips, Related],
                },
                ChecklistTopic {
                    id: "s151-responsibilities",
                    name: "Section 151 Officer Duties",
                    description: "Statutory responsibilities, S114 notices, and legal requirements",
                    is_process_oriented: false,
                    required_areas: &[Overview, Tasks, Contacts, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "year-end-closedown",
                    name: "Year-End & Accounts Closedown",
                    description: "Final accounts preparation, audit, and AGS",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Dates, Contacts, Systems, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "capital-programme",
                    name: "Capital Programme Management",
                    description: "Capital planning, financing decisions, and monitoring",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Dates, Contacts, Systems, Pitfalls, Tips],
                },
            ],
        },
        RoleProfile {
            name: "Head of AP",
            description: "Accounts Payable operations and supplier payment management",
            domain: "Accounts Payable operations, invoice processing, supplier relationships, fraud detection, payment controls",
            key_areas: &[
                "Invoice processing workflows and automation",
                "Supplier onboarding and relationship management",
                "Fraud detection and prevention controls",
                "Payment run processes and authorization",
                "Purchase order matching and three-way reconciliation",
                "Duplicate payment prevention",
                "Supplier query resolution and dispute management",
                "VAT compliance on purchases",
                "Month-end creditor management",
            ],
            topics: vec![
                ChecklistTopic {
                    id: "invoice-processing",
                    name: "Invoice Processing Workflow",
                    description: "End-to-end invoice receipt, validation, coding, and approval",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Systems, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "payment-runs",
                    name: "Payment Run Processing",
                    description: "BACS runs, faster payments, cheques, and payment scheduling",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Dates, Systems, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "supplier-management",
                    name: "Supplier Setup & Management",
                    description: "New supplier onboarding, bank detail changes, and master data",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Contacts, Systems, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "fraud-prevention",
                    name: "Fraud Detection & Prevention",
                    description: "Controls, red flags, bank detail verification, and fraud response",
                    is_process_oriented: false,
                    required_areas: &[Overview, Tasks, Contacts, Pitfalls, Tips, Related],
                },
                ChecklistTopic {
                    id: "po-matching",
                    name: "Purchase Order Matching",
                    description: "Three-way matching, GRN processing, and exception handling",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Systems, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "duplicate-prevention",
                    name: "Duplicate Payment Prevention",
                    description: "Controls and processes to prevent and detect duplicate payments",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Systems, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "supplier-queries",
                    name: "Supplier Query Resolution",
                    description: "Handling supplier enquiries, disputes, and escalations",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Contacts, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "vat-compliance",
                    name: "VAT Compliance on Purchases",
                    description: "VAT treatment, reverse charge, and VAT return input",
                    is_process_oriented: false,
                    required_areas: &[Overview, Tasks, Systems, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "month-end-ap",
                    name: "Month-End Creditor Processes",
                    description: "Accruals, cut-off, reconciliations, and reporting",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Dates, Systems, Pitfalls, Tips],
                },
            ],
        },
        RoleProfile {
            name: "Head of AR",
            description: "Accounts Receivable operations and debt collection management",
            domain: "Accounts Receivable operations, debt collection, customer relationships, write-offs, escalation procedures",
            key_areas: &[
                "Invoicing processes and accuracy",
                "Debt collection strategies and escalation",
                "Customer relationship management during collection",
                "Write-off criteria and approval processes",
                "Aged debt analysis and prioritization",
                "Legal action decisions and external agency use",
                "Payment plan negotiation and management",
                "Cash allocation and reconciliation",
                "Sensitive cases (vulnerable customers, financial hardship)",
            ],
            topics: vec![
                ChecklistTopic {
                    id: "invoicing-process",
                    name: "Invoicing & Billing Process",
                    description: "Invoice creation, approval, and dispatch workflows",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Systems, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "debt-collection",
                    name: "Debt Collection Process",
                    description: "Collection stages, escalation paths, and follow-up procedures",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Dates, Contacts, Systems, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "aged-debt-management",
                    name: "Aged Debt Analysis & Prioritisation",
                    description: "Reviewing aged debt, prioritising collection, and reporting",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Dates, Systems, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "payment-plans",
                    name: "Payment Plan Negotiation",
                    description: "Setting up payment plans, monitoring, and handling defaults",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Contacts, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "write-off-process",
                    name: "Write-Off Procedures",
                    description: "Write-off criteria, approval levels, and processing",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Contacts, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "legal-escalation",
                    name: "Legal Action & External Agencies",
                    description: "When and how to escalate to legal action or debt agencies",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Contacts, Pitfalls, Tips, Related],
                },
                ChecklistTopic {
                    id: "vulnerable-customers",
                    name: "Vulnerable Customer Handling",
                    description: "Identifying vulnerability, appropriate collection approaches, and support",
                    is_process_oriented: false,
                    required_areas: &[Overview, Tasks, Contacts, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "cash-allocation",
                    name: "Cash Allocation & Reconciliation",
                    description: "Allocating payments, handling unidentified receipts, and reconciliation",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Systems, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "bad-debt-provision",
                    name: "Bad Debt Provisioning",
                    description: "Calculating provisions, reporting, and year-end processes",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Dates, Systems, Pitfalls, Tips],
                },
            ],
        },
        RoleProfile {
            name: "Head of Treasury",
            description: "Cash management, investments, borrowing, and banking relationships",
            domain: "Cash management, investments, borrowing, banking relationships, treasury strategy",
            key_areas: &[
                "Daily cash flow forecasting and monitoring",
                "Investment strategy and counterparty selection",
                "Borrowing decisions and PWLB relationships",
                "Banking relationship management",
                "Treasury Management Strategy and practices",
                "Prudential indicators and compliance",
                "Interest rate risk management",
                "Liquidity management and reserves access",
                "Treasury system management and reporting",
            ],
            topics: vec![
                ChecklistTopic {
                    id: "daily-cashflow",
                    name: "Daily Cash Flow Management",
                    description: "Daily cash position, forecasting, and balancing",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Dates, Systems, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "investment-strategy",
                    name: "Investment Strategy & MMFs",
                    description: "Investment policy, counterparty selection, and MMF management",
                    is_process_oriented: false,
                    required_areas: &[Overview, Tasks, Contacts, Systems, Pitfalls, Tips, Related],
                },
                ChecklistTopic {
                    id: "borrowing-decisions",
                    name: "Borrowing & Debt Management",
                    description: "PWLB, internal borrowing, debt restructuring decisions",
                    is_process_oriented: false,
                    required_areas: &[Overview, Tasks, Contacts, Pitfalls, Tips, Related],
                },
                ChecklistTopic {
                    id: "banking-relationships",
                    name: "Banking Relationships",
                    description: "Bank account management, mandates, and relationship management",
                    is_process_oriented: false,
                    required_areas: &[Overview, Contacts, Systems, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "urgent-payments",
                    name: "Urgent Payment Processing",
                    description: "Same-day payments, faster payments, and emergency procedures",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Contacts, Systems, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "prudential-indicators",
                    name: "Prudential Indicators & Compliance",
                    description: "Monitoring and reporting prudential indicators, TM strategy compliance",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Dates, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "year-end-treasury",
                    name: "Year-End Treasury Processes",
                    description: "Year-end valuations, reconciliations, and audit requirements",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Dates, Systems, Pitfalls, Tips],
                },
                ChecklistTopic {
                    id: "risk-management",
                    name: "Treasury Risk Management",
                    description: "Interest rate risk, counterparty risk, and liquidity risk",
                    is_process_oriented: false,
                    required_areas: &[Overview, Contacts, Pitfalls, Tips, Related],
                },
                ChecklistTopic {
                    id: "tm-reporting",
                    name: "Treasury Management Reporting",
                    description: "Member reporting, mid-year review, and annual report",
                    is_process_oriented: true,
                    required_areas: &[Overview, Tasks, Dates, Contacts, Pitfalls, Tips],
                },
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_four_roles_with_checklists() {
        let catalog = RoleCatalog::builtin();
        assert_eq!(catalog.roles().len(), 4);
        assert!(catalog.contains("Finance Director"));
        assert!(catalog.contains("Head of Treasury"));
        assert!(!catalog.contains("Head of Nothing"));

        for role in catalog.roles() {
            assert_eq!(role.topics.len(), 9, "role {} checklist", role.name);
            for topic in &role.topics {
                assert!(!topic.required_areas.is_empty());
            }
        }
    }

    #[test]
    fn checklist_topic_ids_are_unique_per_role() {
        let catalog = RoleCatalog::builtin();
        for role in catalog.roles() {
            let mut ids: Vec<_> = role.topics.iter().map(|t| t.id).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), role.topics.len());
        }
    }

    #[test]
    fn slug_flattens_role_names() {
        assert_eq!(RoleCatalog::slug("Finance Director"), "finance-director");
        assert_eq!(RoleCatalog::slug("Head of AP"), "head-of-ap");
    }

    #[test]
    fn area_info_covers_every_key() {
        for key in AreaKey::ALL {
            let info = area_info(key);
            assert_eq!(info.key, key);
            assert!(!info.name.is_empty());
        }
    }
}

use std::fmt;
use std::sync::Arc;

use skiff_common::config::JoinConfig;
use skiff_common::error::Result;
use skiff_common::types::Schema;
use skiff_planner::{
    JoinRequest, JoinStrategy, MiniBatchStrategy, NativeBridgeStrategy, NativeJoinPlan,
    PlanNodeIdGenerator, PreparedJoin, SemiAntiStrategy, StateKeyWiring, plan_native_join,
    prepare_join,
};
use tracing::{debug, instrument};

use crate::bridge::NativeBridgeOperator;
use crate::join::{MiniBatchJoinOperator, SemiAntiJoinOperator};
use crate::native::{ArrowNativeEngine, NativeEngine, NativeTaskOptions};
use crate::operator::TwoInputOperator;

/// The executable form of a join.
pub struct TranslatedJoin {
    pub operator: Box<dyn TwoInputOperator>,
    pub strategy: JoinStrategy,
    /// The schema of the rows the operator emits.
    pub output_schema: Schema,
    pub key_wiring: StateKeyWiring,
    /// Present for the native bridge strategy only.
    pub plan: Option<NativeJoinPlan>,
}

impl fmt::Debug for TranslatedJoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslatedJoin")
            .field("operator", &self.operator.name())
            .field("strategy", &self.strategy)
            .field("output_schema", &self.output_schema)
            .field("key_wiring", &self.key_wiring)
            .field("plan", &self.plan)
            .finish()
    }
}

/// Turns join requests into running operators.
#[derive(Clone)]
pub struct StreamJoinTranslator {
    config: JoinConfig,
    engine: Arc<dyn NativeEngine>,
}

impl StreamJoinTranslator {
    pub fn new(config: JoinConfig) -> Self {
        Self {
            config,
            engine: Arc::new(ArrowNativeEngine),
        }
    }

    /// Uses `engine` for native bridge joins instead of the in-process one.
    pub fn with_engine(mut self, engine: Arc<dyn NativeEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn config(&self) -> &JoinConfig {
        &self.config
    }

    /// Validates `request`, selects a strategy and builds its operator.
    ///
    /// Node ids are drawn from `ids` only for the native bridge strategy and
    /// only once planning has succeeded.
    #[instrument(level = "debug", skip_all, fields(kind = %request.spec.kind))]
    pub fn translate(
        &self,
        request: &JoinRequest,
        ids: &mut PlanNodeIdGenerator,
    ) -> Result<TranslatedJoin> {
        let prepared = prepare_join(request, &self.config)?;
        let (operator, plan) = match prepared.strategy {
            JoinStrategy::SemiAnti(strategy) => (semi_anti_operator(&prepared, strategy), None),
            JoinStrategy::MiniBatch(strategy) => (mini_batch_operator(&prepared, strategy), None),
            JoinStrategy::NativeBridge(strategy) => {
                let (operator, plan) = self.native_operator(&prepared, strategy, ids)?;
                (operator, Some(plan))
            }
        };
        debug!(
            strategy = %prepared.strategy,
            operator = operator.name(),
            "translated join"
        );
        Ok(TranslatedJoin {
            output_schema: operator.output_schema().clone(),
            operator,
            strategy: prepared.strategy,
            key_wiring: prepared.key_wiring,
            plan,
        })
    }

    #[instrument(level = "debug", skip_all, fields(native_kind = %strategy.native_kind))]
    fn native_operator(
        &self,
        prepared: &PreparedJoin,
        strategy: NativeBridgeStrategy,
        ids: &mut PlanNodeIdGenerator,
    ) -> Result<(Box<dyn TwoInputOperator>, NativeJoinPlan)> {
        let parts = plan_native_join(
            &prepared.spec,
            &prepared.left_type,
            &prepared.right_type,
            &prepared.output_schema,
            ids,
        )?;
        for rename in &parts.schemas.renames {
            debug!(from = %rename.from, to = %rename.to, "renamed right field");
        }
        let options = NativeTaskOptions::new(&self.config.native, prepared.retention);
        let task = self.engine.create_task(&parts.plan, &options)?;
        let operator =
            NativeBridgeOperator::new(task, &parts.plan, parts.schemas.renamed_output.clone());
        Ok((Box::new(operator), parts.plan))
    }
}

impl fmt::Debug for StreamJoinTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamJoinTranslator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[instrument(level = "debug", skip_all, fields(anti = strategy.anti))]
fn semi_anti_operator(
    prepared: &PreparedJoin,
    strategy: SemiAntiStrategy,
) -> Box<dyn TwoInputOperator> {
    Box::new(SemiAntiJoinOperator::new(prepared, strategy))
}

#[instrument(level = "debug", skip_all, fields(size = strategy.size))]
fn mini_batch_operator(
    prepared: &PreparedJoin,
    strategy: MiniBatchStrategy,
) -> Box<dyn TwoInputOperator> {
    Box::new(MiniBatchJoinOperator::new(prepared, strategy))
}
